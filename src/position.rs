//! Per-playlist position persistence.
//!
//! Stores the last-played track index and the "completed today" date for
//! each playlist so playback resumes after a restart and non-looping
//! playlists only run once per calendar day. The store is a seam: the
//! engine takes any `PositionStore`, and tests swap in the in-memory one.
//!
//! Persistence failures are logged and swallowed. The in-memory copy stays
//! authoritative for the session; the next successful write re-syncs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::PlaylistId;
use crate::error::{Error, Result, ResultExt};

/// Persisted state for one playlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistPosition {
    /// Last-played track index (0-based)
    pub track_index: usize,
    /// ISO date this playlist last completed, empty if never
    pub completed_date: String,
}

/// Durable per-playlist resume state.
pub trait PositionStore: Send + Sync {
    /// Saved track index for a playlist (0 if unset).
    fn track_index(&self, id: PlaylistId) -> usize;

    /// Persist the track index. The external player cannot seek, so resume
    /// is track-granular; there is no time position to store.
    fn save_track_index(&self, id: PlaylistId, index: usize);

    /// Record that a non-looping playlist finished today and reset its
    /// index so it restarts from the top on the next study day.
    fn mark_completed_today(&self, id: PlaylistId);

    /// Whether the playlist already completed on the current date.
    fn completed_today(&self, id: PlaylistId) -> bool;
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ============================================================================
// File-backed store
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PositionFile {
    playlists: BTreeMap<PlaylistId, PlaylistPosition>,
}

/// JSON file store, one small record per playlist.
///
/// Writes go through a temp file and an atomic rename; reads tolerate a
/// missing or corrupt file by starting from empty state.
pub struct FilePositionStore {
    path: PathBuf,
    state: Mutex<PositionFile>,
}

impl FilePositionStore {
    /// Open (or create) the store at the default location,
    /// `<config dir>/positions.json`.
    pub fn open_default() -> Option<Self> {
        crate::config::config_dir().map(|d| Self::open(d.join("positions.json")))
    }

    /// Open (or create) the store at a specific path.
    pub fn open(path: PathBuf) -> Self {
        let state = Self::read_file(&path);
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn read_file(path: &Path) -> PositionFile {
        if !path.exists() {
            return PositionFile::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("Corrupt position file {:?}: {}; starting fresh", path, e);
                    PositionFile::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read position file {:?}: {}", path, e);
                PositionFile::default()
            }
        }
    }

    /// Write the current state to disk. Failures are logged, not raised.
    fn flush(&self, state: &PositionFile) {
        if let Err(e) = self.try_flush(state) {
            tracing::error!("Failed to persist positions to {:?}: {}", self.path, e);
        }
    }

    fn try_flush(&self, state: &PositionFile) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).with_context("creating state directory")?;
        }
        let contents =
            serde_json::to_string_pretty(state).map_err(|e| Error::persistence(e.to_string()))?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents).with_context("writing position file")?;
        std::fs::rename(&temp_path, &self.path).with_context("committing position file")
    }
}

impl PositionStore for FilePositionStore {
    fn track_index(&self, id: PlaylistId) -> usize {
        self.state
            .lock()
            .playlists
            .get(&id)
            .map(|p| p.track_index)
            .unwrap_or(0)
    }

    fn save_track_index(&self, id: PlaylistId, index: usize) {
        let mut state = self.state.lock();
        state.playlists.entry(id).or_default().track_index = index;
        tracing::debug!("Saved position: playlist {} track {}", id, index);
        self.flush(&state);
    }

    fn mark_completed_today(&self, id: PlaylistId) {
        let mut state = self.state.lock();
        let entry = state.playlists.entry(id).or_default();
        entry.completed_date = today().to_string();
        entry.track_index = 0;
        tracing::info!("Playlist {} marked completed for {}", id, entry.completed_date);
        self.flush(&state);
    }

    fn completed_today(&self, id: PlaylistId) -> bool {
        self.state
            .lock()
            .playlists
            .get(&id)
            .map(|p| p.completed_date == today().to_string())
            .unwrap_or(false)
    }
}

// ============================================================================
// In-memory store (tests, and a fallback when no config dir exists)
// ============================================================================

/// Volatile store used when no config directory is available and as a
/// fake in engine tests.
#[derive(Default)]
pub struct MemoryPositionStore {
    state: Mutex<BTreeMap<PlaylistId, PlaylistPosition>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for MemoryPositionStore {
    fn track_index(&self, id: PlaylistId) -> usize {
        self.state
            .lock()
            .get(&id)
            .map(|p| p.track_index)
            .unwrap_or(0)
    }

    fn save_track_index(&self, id: PlaylistId, index: usize) {
        self.state.lock().entry(id).or_default().track_index = index;
    }

    fn mark_completed_today(&self, id: PlaylistId) {
        let mut state = self.state.lock();
        let entry = state.entry(id).or_default();
        entry.completed_date = today().to_string();
        entry.track_index = 0;
    }

    fn completed_today(&self, id: PlaylistId) -> bool {
        self.state
            .lock()
            .get(&id)
            .map(|p| p.completed_date == today().to_string())
            .unwrap_or(false)
    }
}
