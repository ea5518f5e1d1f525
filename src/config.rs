//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\study-companion\config.toml
//! - macOS: ~/Library/Application Support/study-companion/config.toml
//! - Linux: ~/.config/study-companion/config.toml
//!
//! The config file is human-readable and editable. Loading never fails:
//! a missing or unparseable file falls back to defaults, because a broken
//! config must degrade to silence, not to an error dialog.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Playlist ids are small positive integers (1, 2, 3 by default).
pub type PlaylistId = u8;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Audio playback settings
    pub audio: AudioConfig,

    /// Study/break cycle settings
    pub cycle: CycleConfig,

    /// Per-playlist sources
    pub playlists: Vec<PlaylistConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            cycle: CycleConfig::default(),
            playlists: vec![
                PlaylistConfig::new(1, true),
                PlaylistConfig::new(2, false),
                PlaylistConfig::new(3, false),
            ],
        }
    }
}

impl Config {
    /// Look up a playlist's configuration by id.
    pub fn playlist(&self, id: PlaylistId) -> Option<&PlaylistConfig> {
        self.playlists.iter().find(|p| p.id == id)
    }

    /// Report the first suspicious value. The consumers clamp or ignore
    /// these anyway; this exists so a hand-edited config gets a warning
    /// instead of silently odd behavior.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::Error;

        if self.audio.volume > 100 {
            return Err(Error::config(format!(
                "volume {} exceeds 100 and will be clamped",
                self.audio.volume
            )));
        }
        if self.cycle.study_days == 0 {
            return Err(Error::config("study_days must be at least 1"));
        }
        for (i, p) in self.playlists.iter().enumerate() {
            if self.playlists[..i].iter().any(|q| q.id == p.id) {
                return Err(Error::config(format!(
                    "playlist id {} appears more than once; only the first is used",
                    p.id
                )));
            }
        }
        Ok(())
    }
}

/// Audio playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Volume level (0-100)
    pub volume: u8,

    /// Show "now playing" / break-day desktop notifications
    pub notifications: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: 50,
            notifications: true,
        }
    }
}

/// Study/break cycle settings.
///
/// The cycle repeats indefinitely from `start_date`: `study_days` days with
/// audio, then `break_days` days of silence. An empty or malformed
/// `start_date` means "not configured"; the cycle math falls back to an
/// implicit Jan 1 start so day labels stay stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Cycle start date, ISO `YYYY-MM-DD`, or empty if unset
    pub start_date: String,

    /// Days of active playback per cycle
    pub study_days: u32,

    /// Days of silence at the end of each cycle
    pub break_days: u32,

    /// Manual override: pin the effective study day instead of deriving it
    pub override_enabled: bool,

    /// Pinned study day when the override is enabled (clamped to 1-31)
    pub override_day: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            start_date: String::new(),
            study_days: 21,
            break_days: 5,
            override_enabled: false,
            override_day: 1,
        }
    }
}

/// A single playlist source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    /// Playlist id (1, 2, 3)
    pub id: PlaylistId,

    /// Source path: a folder of audio files or a single file
    pub path: PathBuf,

    /// Whether this playlist participates in the rotation
    pub enabled: bool,

    /// Loop forever instead of playing through once.
    /// `None` means "use the rotation policy's default for this slot".
    pub loops: Option<bool>,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self::new(1, true)
    }
}

impl PlaylistConfig {
    fn new(id: PlaylistId, loops: bool) -> Self {
        Self {
            id,
            path: PathBuf::new(),
            enabled: true,
            loops: Some(loops),
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("study-companion"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk.
///
/// Returns default config if the file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from a specific path (defaults on any failure).
pub fn load_from(path: &std::path::Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                if let Err(e) = config.validate() {
                    tracing::warn!("{}", e);
                }
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk.
///
/// Creates the config directory if it doesn't exist. The write goes through
/// a temp file and an atomic rename so a crash mid-write never leaves a
/// truncated config behind.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
