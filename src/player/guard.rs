//! Process lifecycle guard.
//!
//! The audio player is an OS-level child process, and the host can die
//! without running its normal shutdown path (force-quit, crash, SIGKILL
//! of a parent). The guard covers both exits:
//!
//! - normal close: `ShutdownGuard` runs the engine's shutdown on Drop;
//! - interrupted process: a ctrl-c/SIGTERM handler runs the same shutdown
//!   (position save, stop, kill-by-name sweep) before exiting.
//!
//! A previous session that died without either still leaves orphans; the
//! engine's startup sweep handles those.

use super::Engine;

/// Stops playback and sweeps player processes when dropped, and installs
/// a signal handler doing the same on ctrl-c/SIGTERM.
pub struct ShutdownGuard {
    engine: Engine,
}

impl ShutdownGuard {
    /// Arm the guard for an engine. Call once, before playback starts.
    pub fn install(engine: Engine) -> Self {
        let handler_engine = engine.clone();
        let result = ctrlc::set_handler(move || {
            tracing::info!("Interrupted, shutting down audio");
            handler_engine.shutdown();
            std::process::exit(0);
        });
        if let Err(e) = result {
            tracing::warn!("Could not install signal handler: {}", e);
        }
        Self { engine }
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        tracing::info!("Cleaning up audio on exit");
        self.engine.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::super::PlaybackStatus;
    use super::super::backend::fake::{Event, FakeBackend};
    use super::*;
    use crate::position::MemoryPositionStore;
    use std::sync::Arc;

    #[test]
    fn test_drop_shuts_engine_down() {
        let fake = FakeBackend::new();
        let engine = Engine::new(
            Arc::new(fake.clone()),
            Arc::new(MemoryPositionStore::new()),
        );

        {
            // Engine was never set up, but the drop path must still stop
            // and sweep
            let _guard = ShutdownGuard { engine: engine.clone() };
        }

        assert_eq!(engine.status(), PlaybackStatus::Idle);
        assert!(fake.events().contains(&Event::Sweep));
    }
}
