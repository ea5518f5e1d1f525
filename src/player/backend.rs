//! External audio player backend.
//!
//! Playback is delegated to an OS-level player process (`afplay` on macOS):
//! spawn it with a file and a volume, and it exits when the file finishes.
//! The backend trait is the seam that lets engine tests run against a fake
//! with no real processes.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// How long to wait after a graceful terminate before force-killing.
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Poll interval for process-exit checks.
const WAIT_POLL: Duration = Duration::from_millis(100);

/// A handle to one spawned track process.
///
/// Shared between the engine (which may stop it) and the waiter thread
/// (which blocks until it exits), so both operations must be callable
/// through `&self`.
pub trait TrackHandle: Send + Sync {
    /// Block until the process has exited, for any reason.
    fn wait(&self);

    /// Terminate the process: graceful signal, short grace period, then
    /// force kill. Idempotent.
    fn stop(&self);
}

/// Spawns and supervises external player processes.
pub trait AudioBackend: Send + Sync {
    /// Start playing one file at the given volume (0.0-1.0). The returned
    /// handle's process exits when the file finishes.
    fn spawn(&self, path: &Path, volume: f32) -> Result<Arc<dyn TrackHandle>>;

    /// Kill every player process by executable name, including orphans
    /// from a previous session this backend has no handle to. Only called
    /// at defined lifecycle points (startup sweep, shutdown).
    fn sweep_orphans(&self);

    /// Probe a file's duration in seconds, best effort (UI progress only).
    fn probe_duration(&self, path: &Path) -> Option<f64>;
}

// ============================================================================
// afplay backend
// ============================================================================

/// Backend driving the macOS `afplay` command (with `pkill` sweeps and
/// `afinfo` duration probes).
pub struct AfplayBackend {
    player: String,
}

impl Default for AfplayBackend {
    fn default() -> Self {
        Self {
            player: "afplay".to_string(),
        }
    }
}

impl AfplayBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for AfplayBackend {
    fn spawn(&self, path: &Path, volume: f32) -> Result<Arc<dyn TrackHandle>> {
        let vol = volume.clamp(0.0, 1.0);
        let child = Command::new(&self.player)
            .arg("-v")
            .arg(format!("{vol}"))
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::playback(format!("failed to spawn {} for {:?}: {e}", self.player, path))
            })?;

        tracing::debug!("Spawned {} (pid {}) for {:?}", self.player, child.id(), path);
        Ok(Arc::new(ProcessTrackHandle {
            path: path.to_path_buf(),
            child: Mutex::new(child),
        }))
    }

    fn sweep_orphans(&self) {
        // -x: exact executable name, so we never catch unrelated processes
        let result = Command::new("pkill")
            .args(["-9", "-x", &self.player])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match result {
            Ok(status) => {
                tracing::debug!("Orphan sweep for {} done (status {})", self.player, status)
            }
            Err(e) => tracing::warn!("Orphan sweep for {} failed: {}", self.player, e),
        }
    }

    fn probe_duration(&self, path: &Path) -> Option<f64> {
        let output = Command::new("afinfo").arg("-b").arg(path).output().ok()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_afinfo_duration(&stdout)
    }
}

/// Pull the duration out of `afinfo -b` output
/// ("estimated duration: 234.567 sec").
fn parse_afinfo_duration(output: &str) -> Option<f64> {
    for line in output.lines() {
        let lower = line.to_lowercase();
        let Some(pos) = lower.find("duration") else {
            continue;
        };
        if !lower.contains("sec") {
            continue;
        }
        let tail = &lower[pos + "duration".len()..];
        let number: String = tail
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if let Ok(secs) = number.parse::<f64>() {
            return Some(secs);
        }
    }
    None
}

/// Handle around a real child process. Exit checks go through `try_wait`
/// under a short-lived lock so `stop` never deadlocks against `wait`.
struct ProcessTrackHandle {
    path: PathBuf,
    child: Mutex<Child>,
}

impl ProcessTrackHandle {
    fn has_exited(&self) -> bool {
        let mut child = self.child.lock();
        match child.try_wait() {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("try_wait failed for {:?}: {}", self.path, e);
                true
            }
        }
    }
}

impl TrackHandle for ProcessTrackHandle {
    fn wait(&self) {
        while !self.has_exited() {
            std::thread::sleep(WAIT_POLL);
        }
    }

    fn stop(&self) {
        {
            let child = self.child.lock();
            terminate_gracefully(&child);
        }

        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if self.has_exited() {
                return;
            }
            std::thread::sleep(WAIT_POLL / 2);
        }

        let mut child = self.child.lock();
        if let Err(e) = child.kill() {
            tracing::debug!("kill for {:?}: {}", self.path, e);
        }
        let _ = child.wait();
    }
}

/// Ask the process to exit with SIGTERM where we can; `Child::kill` is the
/// force-kill fallback handled by the caller.
#[cfg(unix)]
fn terminate_gracefully(child: &Child) {
    let pid = child.id() as libc::pid_t;
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate_gracefully(_child: &Child) {}

// ============================================================================
// Fake backend for engine tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_afinfo_duration() {
        let output = "\
File: /music/track1.mp3
estimated duration: 234.567 sec
";
        assert_eq!(parse_afinfo_duration(output), Some(234.567));
    }

    #[test]
    fn test_parse_afinfo_duration_alternate_line() {
        let output = "audio 12345 valid frames, duration 10.5 sec total\n";
        assert_eq!(parse_afinfo_duration(output), Some(10.5));
    }

    #[test]
    fn test_parse_afinfo_no_duration() {
        assert_eq!(parse_afinfo_duration("no useful lines here\n"), None);
    }
}
