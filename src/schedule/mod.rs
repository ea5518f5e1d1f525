//! Day-based playlist scheduling.
//!
//! Two pure layers: the cycle calculator maps a calendar date onto the
//! repeating study/break cycle, and the rotation policy maps a study day
//! onto the ordered list of playlists to play. Both are deterministic so
//! the playback engine and the schedule preview always agree.

mod cycle;
mod rotation;

pub use cycle::{CycleInfo, cycle_info, effective_study_day};
pub use rotation::{
    SlotDefault, playlist_labels_for_day, playlists_for_day, tracks_for_day,
};
