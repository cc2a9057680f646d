//! `evtrack completions <shell>`
//!
//! Prints a completion script covering the `events`, `sync`, `status` and
//! `config` subcommands with their flags. For bash:
//!
//! ```text
//! evtrack completions bash > ~/.local/share/bash-completion/completions/evtrack
//! ```

use std::io;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

use crate::output::OutputFormat;

/// Arguments for the completions subcommand
#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    /// Prints the completion script to stdout
    ///
    /// The script is shell source, so `--json` does not apply.
    pub async fn execute(&self, _format: OutputFormat) -> Result<()> {
        write_completions(self.shell, &mut io::stdout());
        Ok(())
    }
}

fn write_completions(shell: Shell, out: &mut dyn io::Write) {
    let mut cmd = crate::Cli::command();
    let bin = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, bin, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_script_offers_event_subcommands() {
        let mut out = Vec::new();
        write_completions(Shell::Bash, &mut out);
        let script = String::from_utf8(out).unwrap();

        assert!(script.contains("evtrack"));
        assert!(script.contains("locate"));
        assert!(script.contains("--retry-failed"));
    }
}
