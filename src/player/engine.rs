//! The playback state machine.
//!
//! All mutable playback state lives behind one mutex; transitions triggered
//! by user actions and by natural track completion both funnel through it.
//! Two invariants carry the whole design:
//!
//! 1. Every track start kills the previously tracked process before
//!    spawning a new one, so two player processes never overlap.
//! 2. Every spawn and every explicit stop bump a generation counter; a
//!    waiter thread only acts when its captured generation still matches,
//!    so a stale process exit can never resurrect stopped playback.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::config::{Config, PlaylistId};
use crate::notify;
use crate::position::PositionStore;
use crate::schedule;
use crate::source;

use super::backend::{AudioBackend, TrackHandle};
use super::{PlaybackInfo, PlaybackStatus, QueueEntry};

/// The playlist currently being played through.
struct OpenPlaylist {
    playlist: PlaylistId,
    /// 0-based index into the playlist's track list
    track: usize,
    loops: bool,
    /// Set when a looping playlist has wrapped without spawning anything;
    /// a second wrap means no track is playable and we move on.
    wrapped: bool,
}

#[derive(Default)]
struct EngineState {
    /// Expanded track lists, rebuilt on every setup
    playlists: BTreeMap<PlaylistId, Vec<PathBuf>>,
    /// Today's queue, in playback order
    queue: Vec<QueueEntry>,
    queue_index: usize,
    current: Option<OpenPlaylist>,
    handle: Option<Arc<dyn TrackHandle>>,
    status: PlaybackStatus,
    volume: u8,
    notifications: bool,
    track_started: Option<Instant>,
    /// Display position captured at pause/seek time (seconds)
    paused_at: f64,
    /// Probed duration of the current track (seconds, 0 when unknown)
    track_duration: f64,
}

struct Shared {
    backend: Arc<dyn AudioBackend>,
    store: Arc<dyn PositionStore>,
    state: Mutex<EngineState>,
    generation: AtomicU64,
}

/// Cloneable handle to the playback engine.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    pub fn new(backend: Arc<dyn AudioBackend>, store: Arc<dyn PositionStore>) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                store,
                state: Mutex::new(EngineState::default()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Set up and start today's rotation.
    ///
    /// Sweeps orphaned player processes from previous sessions, rebuilds
    /// the playlists from config, evaluates the cycle for `date`, and
    /// starts the first queue entry. On break days (or before the cycle
    /// start) no queue is built and nothing plays.
    pub fn setup(&self, config: &Config, date: NaiveDate) {
        self.shared.backend.sweep_orphans();

        let mut st = self.shared.state.lock();
        self.stop_process(&mut st);
        st.status = PlaybackStatus::Idle;
        st.current = None;
        st.queue.clear();
        st.queue_index = 0;

        st.volume = config.audio.volume.min(100);
        st.notifications = config.audio.notifications;

        st.playlists = config
            .playlists
            .iter()
            .map(|p| {
                let tracks = if p.enabled {
                    source::expand_source(&p.path)
                } else {
                    Vec::new()
                };
                (p.id, tracks)
            })
            .collect();
        for (id, tracks) in &st.playlists {
            tracing::info!("Playlist {}: {} track(s)", id, tracks.len());
        }

        let info = schedule::cycle_info(&config.cycle, date);
        if info.is_break {
            if info.before_start {
                tracing::info!("Date precedes the cycle start, no audio");
            } else {
                let break_day = info.cycle_day.saturating_sub(config.cycle.study_days.max(1));
                tracing::info!(
                    "Break day {}/{}, no audio today",
                    break_day,
                    config.cycle.break_days
                );
                if st.notifications {
                    notify::break_day(break_day, config.cycle.break_days);
                }
            }
            return;
        }

        let study_day = schedule::effective_study_day(&config.cycle, date);
        tracing::info!(
            "Study day {} (cycle {}, day {})",
            study_day,
            info.cycle_number,
            info.cycle_day
        );

        for slot in schedule::playlists_for_day(study_day) {
            let Some(pl) = config.playlist(slot.playlist) else {
                continue;
            };
            let has_tracks = st
                .playlists
                .get(&slot.playlist)
                .is_some_and(|t| !t.is_empty());
            if !pl.enabled || !has_tracks {
                continue;
            }
            // Loop flags stay data-driven: config overrides the policy default
            let loops = pl.loops.unwrap_or(slot.loops);
            st.queue.push(QueueEntry {
                playlist: slot.playlist,
                loops,
            });
        }

        if st.queue.is_empty() {
            tracing::info!("No active playlists for today");
            return;
        }

        let labels: Vec<String> = st
            .queue
            .iter()
            .map(|e| format!("P{}{}", e.playlist, if e.loops { "*" } else { "" }))
            .collect();
        tracing::info!("Today's queue: {} (* = loops)", labels.join(" -> "));

        self.drive(&mut st);
    }

    /// Pause playback: the display position freezes, the process dies.
    pub fn pause(&self) {
        let mut st = self.shared.state.lock();
        if st.status != PlaybackStatus::Playing {
            return;
        }
        let mut elapsed = st
            .track_started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        if st.track_duration > 0.0 {
            elapsed = elapsed.min(st.track_duration);
        }
        st.paused_at = elapsed;
        self.stop_process(&mut st);
        st.status = PlaybackStatus::Paused;
        tracing::info!("Paused at {:.1}s", st.paused_at);
    }

    /// Resume playback. The external player cannot seek, so the current
    /// track restarts from its beginning; the paused position was only
    /// ever for display.
    pub fn resume(&self) {
        let mut st = self.shared.state.lock();
        if st.status != PlaybackStatus::Paused {
            return;
        }
        st.paused_at = 0.0;
        self.drive(&mut st);
    }

    pub fn toggle_pause(&self) {
        let status = self.shared.state.lock().status;
        match status {
            PlaybackStatus::Playing => self.pause(),
            PlaybackStatus::Paused => self.resume(),
            _ => {}
        }
    }

    /// "Seek" within the current track. There is no real seek capability:
    /// while paused this only moves the displayed position; while playing
    /// it restarts the track.
    pub fn seek(&self, position: f64) {
        let mut st = self.shared.state.lock();
        if st.current.is_none() {
            return;
        }
        let clamped = if st.track_duration > 0.0 {
            position.clamp(0.0, st.track_duration)
        } else {
            position.max(0.0)
        };
        st.paused_at = clamped;
        if st.status == PlaybackStatus::Playing {
            self.stop_process(&mut st);
            self.drive(&mut st);
        }
    }

    /// Skip to the next track, as if the current one had finished.
    pub fn skip_track(&self) {
        let mut st = self.shared.state.lock();
        if !matches!(st.status, PlaybackStatus::Playing | PlaybackStatus::Paused) {
            return;
        }
        let Some(cur) = st.current.as_mut() else {
            return;
        };
        cur.track += 1;
        let (playlist, next) = (cur.playlist, cur.track);
        let len = st.playlists.get(&playlist).map(|t| t.len()).unwrap_or(0);
        if next < len {
            self.shared.store.save_track_index(playlist, next);
        }
        self.stop_process(&mut st);
        self.drive(&mut st);
    }

    /// Skip the rest of the current playlist. Takes the same path as
    /// natural exhaustion, completed-today marking included.
    pub fn skip_playlist(&self) {
        let mut st = self.shared.state.lock();
        if !matches!(st.status, PlaybackStatus::Playing | PlaybackStatus::Paused) {
            return;
        }
        let Some(cur) = st.current.take() else {
            return;
        };
        self.stop_process(&mut st);
        if !cur.loops {
            self.shared.store.mark_completed_today(cur.playlist);
            tracing::info!("Playlist {} skipped (non-looping, marked completed)", cur.playlist);
        }
        st.queue_index += 1;
        self.drive(&mut st);
    }

    /// Stop playback immediately. In-flight waiters become no-ops.
    pub fn stop(&self) {
        let mut st = self.shared.state.lock();
        self.stop_process(&mut st);
        st.status = PlaybackStatus::Idle;
    }

    /// Full shutdown: persist the resume position, stop, and sweep any
    /// player process left by name. Called from the shutdown guard on
    /// normal close and from the signal handler on forced exit.
    pub fn shutdown(&self) {
        {
            let mut st = self.shared.state.lock();
            if matches!(st.status, PlaybackStatus::Playing | PlaybackStatus::Paused) {
                if let Some(cur) = &st.current {
                    tracing::info!(
                        "Saving position: playlist {} track {}",
                        cur.playlist,
                        cur.track
                    );
                    self.shared.store.save_track_index(cur.playlist, cur.track);
                }
            }
            self.stop_process(&mut st);
            st.status = PlaybackStatus::Idle;
        }
        self.shared.backend.sweep_orphans();
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.state.lock().status
    }

    /// Snapshot of the current playback state for display.
    pub fn playback_info(&self) -> PlaybackInfo {
        let st = self.shared.state.lock();
        let mut info = PlaybackInfo {
            status: st.status,
            queue_total: st.queue.len(),
            ..PlaybackInfo::default()
        };
        if !st.queue.is_empty() {
            info.queue_position = (st.queue_index + 1).min(st.queue.len());
        }
        if let Some(cur) = &st.current {
            info.playlist = Some(cur.playlist);
            info.track_index = cur.track;
            info.loops = cur.loops;
            let tracks = st.playlists.get(&cur.playlist);
            info.track_count = tracks.map(|t| t.len()).unwrap_or(0);
            if let Some(path) = tracks.and_then(|t| t.get(cur.track)) {
                info.track_name = file_name(path);
            }
            info.duration = st.track_duration;
            info.position = match st.status {
                PlaybackStatus::Paused => st.paused_at,
                PlaybackStatus::Playing => st
                    .track_started
                    .map(|t| t.elapsed().as_secs_f64())
                    .unwrap_or(0.0),
                _ => 0.0,
            };
            if info.duration > 0.0 {
                info.position = info.position.min(info.duration);
            }
        }
        info
    }

    // ------------------------------------------------------------------
    // Internal transitions
    // ------------------------------------------------------------------

    /// Advance the generation counter, invalidating all older waiters.
    fn bump(&self) -> u64 {
        self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Kill the tracked player process, if any. Bumps the generation so
    /// the dying process's waiter cannot advance playback.
    fn stop_process(&self, st: &mut EngineState) {
        self.bump();
        if let Some(handle) = st.handle.take() {
            handle.stop();
        }
        st.track_started = None;
    }

    /// Walk the queue until a track is playing or the day is done.
    ///
    /// Entered with an open playlist positioned on the track to play, or
    /// with no open playlist (in which case the entry at `queue_index` is
    /// opened). Handles every skip condition by continuing the walk, so
    /// progress through the day's queue is guaranteed.
    fn drive(&self, st: &mut EngineState) {
        loop {
            if st.current.is_none() {
                let Some(entry) = st.queue.get(st.queue_index).copied() else {
                    if !st.queue.is_empty() {
                        tracing::info!("All playlists finished for today");
                        st.status = PlaybackStatus::Finished;
                    } else {
                        st.status = PlaybackStatus::Idle;
                    }
                    return;
                };

                let len = st
                    .playlists
                    .get(&entry.playlist)
                    .map(|t| t.len())
                    .unwrap_or(0);
                if len == 0 {
                    tracing::info!("Playlist {} is empty, skipping", entry.playlist);
                    st.queue_index += 1;
                    continue;
                }
                if !entry.loops && self.shared.store.completed_today(entry.playlist) {
                    tracing::info!(
                        "Playlist {} already completed today, skipping",
                        entry.playlist
                    );
                    st.queue_index += 1;
                    continue;
                }

                let mut track = self.shared.store.track_index(entry.playlist);
                if track >= len {
                    if entry.loops {
                        track = 0;
                    } else {
                        // Index stuck at the end without a completion
                        // marker: treat as completed rather than replay
                        self.shared.store.mark_completed_today(entry.playlist);
                        st.queue_index += 1;
                        continue;
                    }
                }

                tracing::info!(
                    "Starting playlist {} at track {}/{}",
                    entry.playlist,
                    track + 1,
                    len
                );
                if st.notifications {
                    if let Some(path) =
                        st.playlists.get(&entry.playlist).and_then(|t| t.get(track))
                    {
                        notify::now_playing(entry.playlist, entry.loops, &file_name(path));
                    }
                }
                st.current = Some(OpenPlaylist {
                    playlist: entry.playlist,
                    track,
                    loops: entry.loops,
                    wrapped: false,
                });
            }

            let (playlist_id, loops) = {
                let cur = st.current.as_ref().expect("open playlist");
                (cur.playlist, cur.loops)
            };
            let tracks = st.playlists.get(&playlist_id).cloned().unwrap_or_default();

            // Skip over files that vanished since expansion
            {
                let cur = st.current.as_mut().expect("open playlist");
                while cur.track < tracks.len() && !tracks[cur.track].exists() {
                    tracing::warn!("Track {:?} is missing, skipping", tracks[cur.track]);
                    cur.track += 1;
                    self.shared.store.save_track_index(playlist_id, cur.track);
                }
            }

            let track = st.current.as_ref().expect("open playlist").track;
            if track >= tracks.len() {
                let cur = st.current.as_mut().expect("open playlist");
                if loops && !cur.wrapped {
                    cur.track = 0;
                    cur.wrapped = true;
                    self.shared.store.save_track_index(playlist_id, 0);
                    continue;
                }
                if loops {
                    tracing::warn!(
                        "Looping playlist {} has no playable tracks, moving on",
                        playlist_id
                    );
                } else {
                    self.shared.store.mark_completed_today(playlist_id);
                    tracing::info!("Playlist {} finished (non-looping)", playlist_id);
                }
                st.current = None;
                st.queue_index += 1;
                continue;
            }

            // Single-process invariant: whatever was playing dies first
            self.stop_process(st);

            let path = &tracks[track];
            let volume = f32::from(st.volume.min(100)) / 100.0;
            match self.shared.backend.spawn(path, volume) {
                Ok(handle) => {
                    st.track_duration = self.shared.backend.probe_duration(path).unwrap_or(0.0);
                    st.track_started = Some(Instant::now());
                    st.paused_at = 0.0;
                    st.handle = Some(handle.clone());
                    st.status = PlaybackStatus::Playing;
                    st.current.as_mut().expect("open playlist").wrapped = false;
                    let generation = self.bump();
                    self.spawn_waiter(handle, generation);
                    return;
                }
                Err(e) => {
                    tracing::error!("Failed to start track {:?}: {}", path, e);
                    st.current = None;
                    st.queue_index += 1;
                    continue;
                }
            }
        }
    }

    /// Waiter callback: the spawned process exited.
    fn on_track_exit(&self, generation: u64) {
        let mut st = self.shared.state.lock();
        if self.shared.generation.load(Ordering::SeqCst) != generation {
            // The engine moved on while we were blocked; nothing to do
            return;
        }
        st.handle = None;
        st.track_started = None;

        let Some(cur) = st.current.as_mut() else {
            return;
        };
        cur.track += 1;
        let (playlist, next) = (cur.playlist, cur.track);
        self.shared.store.save_track_index(playlist, next);
        self.drive(&mut st);
    }

    fn spawn_waiter(&self, handle: Arc<dyn TrackHandle>, generation: u64) {
        let engine = self.clone();
        let spawned = std::thread::Builder::new()
            .name("track-waiter".to_string())
            .spawn(move || {
                handle.wait();
                engine.on_track_exit(generation);
            });
        if let Err(e) = spawned {
            tracing::error!("Failed to spawn waiter thread: {}", e);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::super::backend::fake::{Event, FakeBackend};
    use super::*;
    use crate::config::CycleConfig;
    use crate::position::{MemoryPositionStore, PositionStore};
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Create `count` mp3 fixtures in a fresh temp dir.
    fn playlist_dir(count: usize, prefix: &str) -> (TempDir, Vec<PathBuf>) {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for i in 0..count {
            let path = dir.path().join(format!("{prefix}{:02}.mp3", i + 1));
            File::create(&path).unwrap();
            paths.push(path);
        }
        (dir, paths)
    }

    /// Config with the manual override pinned to `day` and notifications
    /// off, so the tests control the rotation directly.
    fn config_for_day(day: u32, sources: &[(PlaylistId, &Path)]) -> Config {
        let mut config = Config::default();
        config.audio.notifications = false;
        config.cycle.override_enabled = true;
        config.cycle.override_day = day;
        for (id, path) in sources {
            let pl = config
                .playlists
                .iter_mut()
                .find(|p| p.id == *id)
                .unwrap();
            pl.path = path.to_path_buf();
        }
        config
    }

    fn new_engine(fake: &FakeBackend, store: Arc<dyn PositionStore>) -> Engine {
        Engine::new(Arc::new(fake.clone()), store)
    }

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    #[test]
    fn test_scenario_day_one_rotation() {
        let (d1, p1) = playlist_dir(1, "loop");
        let (d2, p2) = playlist_dir(2, "daily");
        let store: Arc<dyn PositionStore> = Arc::new(MemoryPositionStore::new());
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, store.clone());

        // Study day 1: playlist 2 (once) then playlist 1 (loops)
        engine.setup(&config_for_day(1, &[(1, d1.path()), (2, d2.path())]), today());

        fake.wait_for_spawns(1);
        assert_eq!(fake.spawned_paths(), vec![p2[0].clone()]);

        fake.complete(0);
        fake.wait_for_spawns(2);
        assert_eq!(fake.spawned_paths()[1], p2[1]);

        fake.complete(1);
        fake.wait_for_spawns(3);
        // Playlist 2 exhausted: completed today, playlist 1 takes over
        assert!(store.completed_today(2));
        assert!(!store.completed_today(1));
        assert_eq!(fake.spawned_paths()[2], p1[0]);

        // Playlist 1 loops its single track indefinitely
        fake.complete(2);
        fake.wait_for_spawns(4);
        assert_eq!(fake.spawned_paths()[3], p1[0]);
        assert_eq!(engine.status(), PlaybackStatus::Playing);
    }

    #[test]
    fn test_scenario_break_day_spawns_nothing() {
        let (d1, _) = playlist_dir(2, "loop");
        let mut config = config_for_day(1, &[(1, d1.path())]);
        config.cycle = CycleConfig {
            start_date: "2026-01-01".to_string(),
            study_days: 21,
            break_days: 5,
            ..CycleConfig::default()
        };
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, Arc::new(MemoryPositionStore::new()));

        // 2026-01-22 is cycle day 22: the first break day
        let date = NaiveDate::from_ymd_opt(2026, 1, 22).unwrap();
        engine.setup(&config, date);

        assert_eq!(fake.spawn_count(), 0);
        assert_eq!(engine.status(), PlaybackStatus::Idle);
        // Only the startup sweep touched the backend
        assert_eq!(fake.events(), vec![Event::Sweep]);
    }

    #[test]
    fn test_resume_from_persisted_index() {
        let (d1, p1) = playlist_dir(5, "loop");
        let store: Arc<dyn PositionStore> = Arc::new(MemoryPositionStore::new());
        store.save_track_index(1, 3);
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, store);

        // Even day: playlist 1 only
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());

        fake.wait_for_spawns(1);
        assert_eq!(fake.spawned_paths(), vec![p1[3].clone()]);
        assert_eq!(engine.playback_info().track_index, 3);
    }

    #[test]
    fn test_completed_playlist_not_replayed_same_day() {
        let (d1, p1) = playlist_dir(1, "loop");
        let (d2, _) = playlist_dir(2, "daily");
        let store: Arc<dyn PositionStore> = Arc::new(MemoryPositionStore::new());
        store.mark_completed_today(2);
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, store);

        engine.setup(&config_for_day(1, &[(1, d1.path()), (2, d2.path())]), today());

        fake.wait_for_spawns(1);
        // Playlist 2 skipped entirely; playback went straight to playlist 1
        assert_eq!(fake.spawned_paths(), vec![p1[0].clone()]);
    }

    #[test]
    fn test_pause_kills_process_and_freezes() {
        let (d1, _) = playlist_dir(2, "loop");
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, Arc::new(MemoryPositionStore::new()));
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());
        fake.wait_for_spawns(1);

        engine.pause();
        assert_eq!(engine.status(), PlaybackStatus::Paused);
        assert!(!fake.is_running(0));

        // The killed process's waiter observes the exit but must not
        // advance playback (stale generation)
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fake.spawn_count(), 1);
    }

    #[test]
    fn test_resume_restarts_same_track() {
        let (d1, p1) = playlist_dir(2, "loop");
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, Arc::new(MemoryPositionStore::new()));
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());
        fake.wait_for_spawns(1);

        engine.pause();
        engine.resume();
        fake.wait_for_spawns(2);

        // Same track, from the beginning; the old process is long dead
        assert_eq!(fake.spawned_paths(), vec![p1[0].clone(), p1[0].clone()]);
        assert!(!fake.is_running(0));
        assert!(fake.is_running(1));
        assert_eq!(engine.status(), PlaybackStatus::Playing);
    }

    #[test]
    fn test_seek_while_playing_restarts_track_and_clamps() {
        let (d1, p1) = playlist_dir(2, "loop");
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, Arc::new(MemoryPositionStore::new()));
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());
        fake.wait_for_spawns(1);

        // Seeking past the end clamps and restarts the same track
        engine.seek(500.0);
        fake.wait_for_spawns(2);
        assert_eq!(fake.spawned_paths(), vec![p1[0].clone(), p1[0].clone()]);
        assert!(!fake.is_running(0));
        assert!(fake.is_running(1));
        let info = engine.playback_info();
        assert!(info.position <= info.duration);

        // A negative seek while paused only moves the display position
        engine.pause();
        engine.seek(-10.0);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fake.spawn_count(), 2);
        assert_eq!(engine.playback_info().position, 0.0);
        assert_eq!(engine.status(), PlaybackStatus::Paused);
    }

    #[test]
    fn test_shutdown_saves_current_position() {
        let (d1, _) = playlist_dir(3, "loop");
        let store: Arc<dyn PositionStore> = Arc::new(MemoryPositionStore::new());
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, store.clone());
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());
        fake.wait_for_spawns(1);

        fake.complete(0);
        fake.wait_for_spawns(2);
        fake.complete(1);
        fake.wait_for_spawns(3);

        // Track index 2 is playing. Clobber the stored index so the
        // assertion can only pass if shutdown itself writes it back.
        store.save_track_index(1, 0);
        engine.shutdown();

        assert_eq!(engine.status(), PlaybackStatus::Idle);
        assert_eq!(store.track_index(1), 2);
        assert!(fake.events().contains(&Event::Sweep));
    }

    #[test]
    fn test_single_process_invariant_under_skips() {
        let (d1, p1) = playlist_dir(3, "loop");
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, Arc::new(MemoryPositionStore::new()));
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());
        fake.wait_for_spawns(1);

        engine.skip_track();
        fake.wait_for_spawns(2);
        engine.skip_track();
        fake.wait_for_spawns(3);

        assert_eq!(
            fake.spawned_paths(),
            vec![p1[0].clone(), p1[1].clone(), p1[2].clone()]
        );
        // At every point, only the newest spawn is alive
        assert!(!fake.is_running(0));
        assert!(!fake.is_running(1));
        assert!(fake.is_running(2));
    }

    #[test]
    fn test_skip_track_wraps_looping_playlist() {
        let (d1, p1) = playlist_dir(2, "loop");
        let store: Arc<dyn PositionStore> = Arc::new(MemoryPositionStore::new());
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, store.clone());
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());
        fake.wait_for_spawns(1);

        engine.skip_track(); // -> track 1
        fake.wait_for_spawns(2);
        engine.skip_track(); // past the end -> wraps to track 0
        fake.wait_for_spawns(3);

        assert_eq!(
            fake.spawned_paths(),
            vec![p1[0].clone(), p1[1].clone(), p1[0].clone()]
        );
        assert_eq!(store.track_index(1), 0);
    }

    #[test]
    fn test_skip_playlist_marks_completed() {
        let (d1, p1) = playlist_dir(1, "loop");
        let (d2, p2) = playlist_dir(3, "daily");
        let store: Arc<dyn PositionStore> = Arc::new(MemoryPositionStore::new());
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, store.clone());
        engine.setup(&config_for_day(1, &[(1, d1.path()), (2, d2.path())]), today());
        fake.wait_for_spawns(1);
        assert_eq!(fake.spawned_paths(), vec![p2[0].clone()]);

        engine.skip_playlist();
        fake.wait_for_spawns(2);

        assert!(store.completed_today(2));
        assert_eq!(fake.spawned_paths()[1], p1[0]);
    }

    #[test]
    fn test_queue_exhaustion_finishes() {
        // Playlist 1 disabled: only the non-looping playlist 2 plays
        let (d2, _) = playlist_dir(2, "daily");
        let store: Arc<dyn PositionStore> = Arc::new(MemoryPositionStore::new());
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, store.clone());
        let mut config = config_for_day(1, &[(2, d2.path())]);
        config.playlists.iter_mut().find(|p| p.id == 1).unwrap().enabled = false;
        engine.setup(&config, today());

        fake.wait_for_spawns(1);
        fake.complete(0);
        fake.wait_for_spawns(2);
        fake.complete(1);

        // Give the waiter a moment to finish the queue
        let deadline = Instant::now() + Duration::from_secs(2);
        while engine.status() != PlaybackStatus::Finished && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(engine.status(), PlaybackStatus::Finished);
        assert!(store.completed_today(2));
        assert_eq!(fake.spawn_count(), 2);
    }

    #[test]
    fn test_stop_invalidates_waiter() {
        let (d1, _) = playlist_dir(2, "loop");
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, Arc::new(MemoryPositionStore::new()));
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());
        fake.wait_for_spawns(1);

        engine.stop();
        assert_eq!(engine.status(), PlaybackStatus::Idle);

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fake.spawn_count(), 1);
    }

    #[test]
    fn test_missing_file_skipped_with_index_persisted() {
        let (d1, p1) = playlist_dir(3, "loop");
        let store: Arc<dyn PositionStore> = Arc::new(MemoryPositionStore::new());
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, store.clone());
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());
        fake.wait_for_spawns(1);

        // Track 1 vanishes while track 0 is playing
        std::fs::remove_file(&p1[1]).unwrap();
        fake.complete(0);
        fake.wait_for_spawns(2);

        assert_eq!(fake.spawned_paths(), vec![p1[0].clone(), p1[2].clone()]);
        assert_eq!(store.track_index(1), 2);
    }

    #[test]
    fn test_spawn_failure_advances_queue() {
        let (d1, p1) = playlist_dir(1, "loop");
        let (d2, p2) = playlist_dir(2, "daily");
        let store: Arc<dyn PositionStore> = Arc::new(MemoryPositionStore::new());
        let fake = FakeBackend::new();
        fake.fail_spawns_for(p2[0].clone());
        let engine = new_engine(&fake, store.clone());

        engine.setup(&config_for_day(1, &[(1, d1.path()), (2, d2.path())]), today());
        fake.wait_for_spawns(1);

        // Playlist 2's first track failed to spawn: move on to playlist 1
        // without pretending playlist 2 completed
        assert_eq!(fake.spawned_paths(), vec![p1[0].clone()]);
        assert!(!store.completed_today(2));
    }

    #[test]
    fn test_playback_info_snapshot() {
        let (d1, _) = playlist_dir(3, "loop");
        let fake = FakeBackend::new();
        let engine = new_engine(&fake, Arc::new(MemoryPositionStore::new()));
        engine.setup(&config_for_day(2, &[(1, d1.path())]), today());
        fake.wait_for_spawns(1);

        let info = engine.playback_info();
        assert_eq!(info.status, PlaybackStatus::Playing);
        assert_eq!(info.playlist, Some(1));
        assert_eq!(info.track_index, 0);
        assert_eq!(info.track_count, 3);
        assert_eq!(info.track_name, "loop01.mp3");
        assert_eq!(info.queue_position, 1);
        assert_eq!(info.queue_total, 1);
        assert!(info.loops);
    }
}
