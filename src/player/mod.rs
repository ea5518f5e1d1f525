//! Background playback.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Engine (control flow)                    │
//! │   one mutex around all playback state; every transition      │
//! │   kills the previous player process before spawning a new one│
//! └───────────────┬──────────────────────────────┬───────────────┘
//!                 │ spawn                        │ exit observed
//!                 ▼                              │
//! ┌───────────────────────────┐   ┌──────────────┴───────────────┐
//! │  External player process  │   │  Waiter thread (per track)   │
//! │  (afplay, one at a time)  │──▶│  blocks on process exit,     │
//! └───────────────────────────┘   │  then advances the engine    │
//!                                 └──────────────────────────────┘
//! ```
//!
//! Waiter threads carry the generation id captured at spawn time; a waiter
//! whose generation no longer matches (the engine stopped or restarted
//! playback out-of-band) does nothing, so a stale exit can never resurrect
//! playback.

mod backend;
mod engine;
mod guard;

pub use backend::{AfplayBackend, AudioBackend, TrackHandle};
pub use engine::Engine;
pub use guard::ShutdownGuard;

use crate::config::PlaylistId;

/// Engine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// Nothing scheduled (before setup, after stop, break day)
    #[default]
    Idle,
    Playing,
    Paused,
    /// Today's queue is exhausted; nothing more until the next setup
    Finished,
}

/// One entry of the day's playback queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub playlist: PlaylistId,
    pub loops: bool,
}

/// Snapshot of playback state for display.
#[derive(Debug, Clone, Default)]
pub struct PlaybackInfo {
    pub status: PlaybackStatus,
    /// Currently open playlist, if any
    pub playlist: Option<PlaylistId>,
    /// 0-based index into the playlist's track list
    pub track_index: usize,
    /// Track count of the open playlist
    pub track_count: usize,
    /// Filename of the current track
    pub track_name: String,
    /// 1-based position in today's queue
    pub queue_position: usize,
    pub queue_total: usize,
    /// Whether the open playlist loops
    pub loops: bool,
    /// Elapsed seconds in the current track (display only)
    pub position: f64,
    /// Probed track duration in seconds (0 when unknown)
    pub duration: f64,
}

impl PlaybackInfo {
    /// "MM:SS / MM:SS" progress string.
    pub fn progress(&self) -> String {
        format!(
            "{} / {}",
            format_seconds(self.position),
            format_seconds(self.duration)
        )
    }
}

fn format_seconds(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_progress() {
        let info = PlaybackInfo {
            position: 75.4,
            duration: 200.0,
            ..PlaybackInfo::default()
        };
        assert_eq!(info.progress(), "1:15 / 3:20");
    }
}
