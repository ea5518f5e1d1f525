//! Command-line interface for study-companion.
//!
//! The subcommands stand in for the host application's lifecycle hooks:
//! `play` is the "host ready" entry point, `stop` the cleanup sweep.

mod commands;

pub use commands::{Cli, Commands, run_command};
