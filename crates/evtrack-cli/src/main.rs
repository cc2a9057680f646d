//! evtrack CLI - Command-line interface for evtrack
//!
//! Provides commands for:
//! - Tracking, editing and deleting events
//! - Delivering queued changes and polling the server
//! - Viewing sync status
//! - Managing configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, events::EventsCommand,
    status::StatusCommand, sync::SyncCommand,
};
use context::CliContext;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "evtrack", version, about = "Track life events and sync them to your server")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track and manage events
    #[command(subcommand)]
    Events(EventsCommand),
    /// Deliver queued changes and fetch remote ones
    Sync(SyncCommand),
    /// Show synchronization status
    Status(StatusCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with --json output
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CliContext::new(cli.config);

    match cli.command {
        Commands::Events(cmd) => cmd.execute(&ctx, format).await,
        Commands::Sync(cmd) => cmd.execute(&ctx, format).await,
        Commands::Status(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(cmd) => cmd.execute(&ctx, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["evtrack", "status", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_parse_sync_flags() {
        let cli = Cli::try_parse_from(["evtrack", "sync", "--no-poll", "--retry-failed"]).unwrap();
        match cli.command {
            Commands::Sync(cmd) => {
                assert!(cmd.no_poll);
                assert!(cmd.retry_failed);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
