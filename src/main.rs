//! Study Companion - day-cycled background audio for study sessions.
//!
//! Rotates among configured playlists on a repeating study/break cycle,
//! delegating actual playback to an external OS player process. Resume
//! positions and per-day completion markers survive restarts.

pub mod cli;
pub mod config;
pub mod error;
pub mod notify;
pub mod player;
pub mod position;
pub mod quotes;
pub mod schedule;
pub mod source;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("study_companion=info".parse().unwrap()))
        .init();

    cli::run_command(&args)
}
