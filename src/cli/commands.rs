//! CLI command definitions and handlers.
//!
//! Each subcommand is implemented as a function that takes the parsed
//! arguments and returns an `anyhow::Result<()>`.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::player::{
    AfplayBackend, Engine, PlaybackStatus, ShutdownGuard,
};
use crate::position::{FilePositionStore, MemoryPositionStore, PositionStore};
use crate::quotes::QuotePool;
use crate::schedule;

/// Study Companion CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Play today's playlist rotation until it finishes
    Play,
    /// Show the cycle position for a date
    Status {
        /// Date to inspect (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Preview the upcoming rotation
    Schedule {
        /// Number of days to preview
        #[arg(short, long, default_value = "14")]
        days: u32,
        /// Also list each playlist's tracks
        #[arg(short, long)]
        tracks: bool,
    },
    /// Print motivational quote(s)
    Quote {
        /// How many distinct quotes
        #[arg(short, long, default_value = "1")]
        count: usize,
    },
    /// Kill any stray audio player processes
    Stop,
    /// Write a default config file for editing
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Play => play(),
        Commands::Status { date } => status(date.as_deref()),
        Commands::Schedule { days, tracks } => preview_schedule(*days, *tracks),
        Commands::Quote { count } => quote(*count),
        Commands::Stop => stop(),
        Commands::Init { force } => init(*force),
    }
}

fn open_store() -> Arc<dyn PositionStore> {
    match FilePositionStore::open_default() {
        Some(store) => Arc::new(store),
        None => {
            warn!("No config directory available; positions will not survive a restart");
            Arc::new(MemoryPositionStore::new())
        }
    }
}

/// Run today's rotation in the foreground.
fn play() -> anyhow::Result<()> {
    let config = config::load();
    let engine = Engine::new(Arc::new(AfplayBackend::new()), open_store());
    let _guard = ShutdownGuard::install(engine.clone());

    println!("{}", QuotePool::load_default().random());
    engine.setup(&config, Local::now().date_naive());

    if engine.status() == PlaybackStatus::Idle {
        info!("Nothing scheduled; exiting");
        return Ok(());
    }

    println!("Controls: p pause/resume, n next track, N next playlist, s <secs> seek, i info, q quit");
    spawn_control_thread(engine.clone());

    loop {
        match engine.status() {
            PlaybackStatus::Finished => {
                info!("Rotation finished for today");
                return Ok(());
            }
            PlaybackStatus::Idle => return Ok(()),
            _ => {
                let snapshot = engine.playback_info();
                if let Some(playlist) = snapshot.playlist {
                    tracing::debug!(
                        "Playlist {} track {}/{} ({}) {}",
                        playlist,
                        snapshot.track_index + 1,
                        snapshot.track_count,
                        snapshot.track_name,
                        snapshot.progress()
                    );
                }
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }
}

/// Read playback commands from stdin while `play` runs. The GUI these
/// hooks grew out of had buttons for the same five actions.
fn spawn_control_thread(engine: Engine) {
    let spawned = std::thread::Builder::new()
        .name("keyboard-control".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let mut parts = line.split_whitespace();
                match parts.next() {
                    Some("p") => engine.toggle_pause(),
                    Some("n") => engine.skip_track(),
                    Some("N") => engine.skip_playlist(),
                    Some("s") => {
                        if let Some(secs) = parts.next().and_then(|s| s.parse::<f64>().ok()) {
                            engine.seek(secs);
                        } else {
                            println!("usage: s <seconds>");
                        }
                    }
                    Some("i") => {
                        let snapshot = engine.playback_info();
                        match snapshot.playlist {
                            Some(playlist) => println!(
                                "Playlist {} ({}/{} in queue), track {}/{}: {} [{}]",
                                playlist,
                                snapshot.queue_position,
                                snapshot.queue_total,
                                snapshot.track_index + 1,
                                snapshot.track_count,
                                snapshot.track_name,
                                snapshot.progress()
                            ),
                            None => println!("Nothing playing"),
                        }
                    }
                    Some("q") => {
                        engine.stop();
                        break;
                    }
                    Some(other) => println!("Unknown command '{other}'"),
                    None => {}
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Could not start keyboard control thread: {}", e);
    }
}

fn parse_date(date: Option<&str>) -> anyhow::Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD")),
        None => Ok(Local::now().date_naive()),
    }
}

/// Print the cycle position for a date.
fn status(date: Option<&str>) -> anyhow::Result<()> {
    let config = config::load();
    let date = parse_date(date)?;
    let info = schedule::cycle_info(&config.cycle, date);

    println!("Date: {date}");
    if info.before_start {
        println!("Before the cycle start ({}); no audio", info.cycle_start);
        return Ok(());
    }
    if info.implicit_start {
        println!("No cycle start configured; labeling from Jan 1");
    }
    println!(
        "Cycle {}, day {}/{}",
        info.cycle_number,
        info.cycle_day,
        config.cycle.study_days + config.cycle.break_days
    );
    println!("Cycle runs {} to {}", info.cycle_start, info.cycle_end);

    if info.is_break {
        println!(
            "Break day {}/{} - no audio",
            info.cycle_day - config.cycle.study_days,
            config.cycle.break_days
        );
    } else {
        let study_day = schedule::effective_study_day(&config.cycle, date);
        let labels = schedule::playlist_labels_for_day(study_day);
        println!("Study day {}: {}", study_day, labels.join(", "));
    }
    Ok(())
}

/// Print the rotation for the next `days` days.
fn preview_schedule(days: u32, with_tracks: bool) -> anyhow::Result<()> {
    let config = config::load();
    let today = Local::now().date_naive();

    for offset in 0..days {
        let date = today
            .checked_add_days(Days::new(offset as u64))
            .context("date out of range")?;
        let info = schedule::cycle_info(&config.cycle, date);

        if info.is_break {
            println!("{date}  break");
            continue;
        }

        let study_day = schedule::effective_study_day(&config.cycle, date);
        let labels = schedule::playlist_labels_for_day(study_day);
        println!("{date}  day {:>2}  {}", study_day, labels.join(", "));

        if with_tracks {
            for (playlist, tracks) in schedule::tracks_for_day(&config, study_day) {
                if tracks.is_empty() {
                    println!("            P{playlist}: (no tracks)");
                } else {
                    println!("            P{playlist}: {}", tracks.join(", "));
                }
            }
        }
    }
    Ok(())
}

fn quote(count: usize) -> anyhow::Result<()> {
    let pool = QuotePool::load_default();
    for q in pool.unique_random(count.max(1)) {
        println!("{q}");
    }
    Ok(())
}

/// Orphan sweep, for cleaning up after a crashed session by hand.
fn stop() -> anyhow::Result<()> {
    use crate::player::AudioBackend;
    AfplayBackend::new().sweep_orphans();
    info!("Swept stray player processes");
    Ok(())
}

/// Write a default config file as a starting point for editing.
fn init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path().context("could not determine config directory")?;
    if path.exists() && !force {
        anyhow::bail!("config already exists at {path:?} (use --force to overwrite)");
    }
    config::save(&Config::default())?;
    println!("Wrote default config to {path:?}");
    Ok(())
}
