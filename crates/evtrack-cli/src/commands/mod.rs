//! CLI subcommands

pub mod completions;
pub mod config;
pub mod events;
pub mod status;
pub mod sync;
