//! Playlist rotation policy.
//!
//! Which playlists play on a given study day, in playback order:
//!
//! - Playlist 1 plays every study day and loops forever.
//! - Playlist 2 plays on odd days where `day % 4 == 1` (1, 5, 9, ... 21).
//! - Playlist 3 plays on odd days where `day % 4 == 3` (3, 7, 11, ... 19).
//! - Even days get playlist 1 only; break days (0) get nothing.
//!
//! Non-looping playlists come first: the looping playlist is the filler
//! that runs indefinitely once the day's finite content is exhausted.

use std::collections::BTreeMap;

use crate::config::{Config, PlaylistId};
use crate::source;

/// One slot in a day's rotation: a playlist and whether the policy would
/// loop it by default. The per-playlist config flag may override the
/// default when the day's queue is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDefault {
    pub playlist: PlaylistId,
    pub loops: bool,
}

impl SlotDefault {
    const fn looping(playlist: PlaylistId) -> Self {
        Self {
            playlist,
            loops: true,
        }
    }

    const fn once(playlist: PlaylistId) -> Self {
        Self {
            playlist,
            loops: false,
        }
    }
}

/// Ordered playlists for a study day. Day 0 (break) yields nothing.
pub fn playlists_for_day(study_day: u32) -> Vec<SlotDefault> {
    if study_day == 0 {
        return Vec::new();
    }

    if study_day % 2 == 0 {
        return vec![SlotDefault::looping(1)];
    }

    if study_day % 4 == 1 && study_day <= 21 {
        vec![SlotDefault::once(2), SlotDefault::looping(1)]
    } else if study_day % 4 == 3 && study_day <= 19 {
        vec![SlotDefault::once(3), SlotDefault::looping(1)]
    } else {
        // Odd days past the patterned range (23, 25, ...) in long cycles
        vec![SlotDefault::looping(1)]
    }
}

/// Human-readable labels for a day's rotation ("Playlist 2", "Playlist 1
/// (loops)"), for the schedule preview.
pub fn playlist_labels_for_day(study_day: u32) -> Vec<String> {
    playlists_for_day(study_day)
        .iter()
        .map(|slot| {
            if slot.loops {
                format!("Playlist {} (loops)", slot.playlist)
            } else {
                format!("Playlist {}", slot.playlist)
            }
        })
        .collect()
}

/// Track filenames that would play on a study day, per playlist.
///
/// Disabled or empty playlists map to an empty list so the preview shows
/// the gap rather than hiding the slot.
pub fn tracks_for_day(config: &Config, study_day: u32) -> BTreeMap<PlaylistId, Vec<String>> {
    let mut result = BTreeMap::new();

    for slot in playlists_for_day(study_day) {
        let names = match config.playlist(slot.playlist) {
            Some(p) if p.enabled && !p.path.as_os_str().is_empty() => {
                source::expand_source(&p.path)
                    .iter()
                    .map(|f| {
                        f.file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_default()
                    })
                    .collect()
            }
            _ => Vec::new(),
        };
        result.insert(slot.playlist, names);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_break_day_is_silent() {
        assert!(playlists_for_day(0).is_empty());
    }

    #[test]
    fn test_even_days_baseline_only() {
        for day in [2, 4, 10, 20] {
            assert_eq!(playlists_for_day(day), vec![SlotDefault::looping(1)]);
        }
    }

    #[test]
    fn test_playlist_two_days() {
        for day in [1, 5, 9, 13, 17, 21] {
            assert_eq!(
                playlists_for_day(day),
                vec![SlotDefault::once(2), SlotDefault::looping(1)],
                "day {day}"
            );
        }
    }

    #[test]
    fn test_playlist_three_days() {
        for day in [3, 7, 11, 15, 19] {
            assert_eq!(
                playlists_for_day(day),
                vec![SlotDefault::once(3), SlotDefault::looping(1)],
                "day {day}"
            );
        }
    }

    #[test]
    fn test_odd_days_past_pattern() {
        // 23 would be % 4 == 3 but exceeds 19; 25 is % 4 == 1 but exceeds 21
        for day in [23, 25, 27, 29, 31] {
            assert_eq!(playlists_for_day(day), vec![SlotDefault::looping(1)], "day {day}");
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            playlist_labels_for_day(1),
            vec!["Playlist 2".to_string(), "Playlist 1 (loops)".to_string()]
        );
    }

    proptest! {
        /// Totality over the realistic day range: ids stay in {1,2,3},
        /// non-looping slots precede the looping baseline, and the
        /// baseline closes every non-empty rotation.
        #[test]
        fn prop_rotation_shape(day in 0u32..=31) {
            let slots = playlists_for_day(day);
            prop_assert!(slots.iter().all(|s| (1..=3).contains(&s.playlist)));
            if day == 0 {
                prop_assert!(slots.is_empty());
            } else {
                prop_assert_eq!(slots.last().copied(), Some(SlotDefault::looping(1)));
                let first_loop = slots.iter().position(|s| s.loops).unwrap();
                prop_assert!(slots[..first_loop].iter().all(|s| !s.loops));
            }
            if day != 0 && day % 2 == 0 {
                prop_assert_eq!(slots, vec![SlotDefault::looping(1)]);
            }
        }
    }
}
