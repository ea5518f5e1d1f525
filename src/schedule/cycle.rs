//! Study/break cycle calculation.
//!
//! A cycle is `study_days` days of active playback followed by `break_days`
//! days of silence, repeating indefinitely from the configured start date.
//! Everything here is a pure function of (config, date); there is no stored
//! "current cycle" counter to drift out of sync.

use chrono::{Datelike, Days, NaiveDate};

use crate::config::CycleConfig;

/// Position of a date within the repeating study/break cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleInfo {
    /// 1-based day within the cycle (1..=study+break), 0 if before start
    pub cycle_day: u32,
    /// Whether this date falls in the trailing break days
    pub is_break: bool,
    /// Effective study day (1..=study_days), 0 on break days
    pub study_day: u32,
    /// 1-based cycle counter, 0 if before start
    pub cycle_number: u32,
    /// First date of the current cycle
    pub cycle_start: NaiveDate,
    /// Last date of the current cycle
    pub cycle_end: NaiveDate,
    /// True when no valid start date was configured (implicit Jan 1 start)
    pub implicit_start: bool,
    /// True when the query date precedes the configured start
    pub before_start: bool,
}

/// Calculate cycle information for a date.
///
/// An empty or malformed `start_date` falls back to Jan 1 of the query
/// year; the labels stay stable without gating playback on configuration.
/// A date before a configured start yields the "before start" shape
/// (break, day 0) so nothing plays until the cycle begins.
pub fn cycle_info(cfg: &CycleConfig, date: NaiveDate) -> CycleInfo {
    let study_days = cfg.study_days.max(1);
    let break_days = cfg.break_days;
    let cycle_length = study_days + break_days;

    let (start, implicit) = match parse_start_date(&cfg.start_date) {
        Some(d) => (d, false),
        None => (
            NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
            true,
        ),
    };

    let days_elapsed = (date - start).num_days();
    if days_elapsed < 0 {
        return CycleInfo {
            cycle_day: 0,
            is_break: true,
            study_day: 0,
            cycle_number: 0,
            cycle_start: start,
            cycle_end: add_days(start, cycle_length as u64 - 1),
            implicit_start: implicit,
            before_start: true,
        };
    }

    let days_elapsed = days_elapsed as u64;
    let len = cycle_length as u64;
    let cycle_number = (days_elapsed / len + 1) as u32;
    let cycle_day = (days_elapsed % len + 1) as u32;
    let is_break = cycle_day > study_days;

    let cycle_start = add_days(start, (cycle_number as u64 - 1) * len);
    let cycle_end = add_days(cycle_start, len - 1);

    CycleInfo {
        cycle_day,
        is_break,
        study_day: if is_break { 0 } else { cycle_day },
        cycle_number,
        cycle_start,
        cycle_end,
        implicit_start: implicit,
        before_start: false,
    }
}

/// Effective study day for playlist selection, honoring the manual override.
///
/// Returns 0 on break days (no playback).
pub fn effective_study_day(cfg: &CycleConfig, date: NaiveDate) -> u32 {
    if cfg.override_enabled {
        return cfg.override_day.clamp(1, 31);
    }
    cycle_info(cfg, date).study_day
}

/// Parse an ISO `YYYY-MM-DD` start date; anything else counts as unset.
fn parse_start_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg(start: &str, study: u32, brk: u32) -> CycleConfig {
        CycleConfig {
            start_date: start.to_string(),
            study_days: study,
            break_days: brk,
            ..CycleConfig::default()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_day_of_cycle() {
        let info = cycle_info(&cfg("2026-02-01", 21, 5), date(2026, 2, 1));
        assert_eq!(info.cycle_number, 1);
        assert_eq!(info.cycle_day, 1);
        assert_eq!(info.study_day, 1);
        assert!(!info.is_break);
        assert_eq!(info.cycle_start, date(2026, 2, 1));
        assert_eq!(info.cycle_end, date(2026, 2, 26));
    }

    #[test]
    fn test_break_days() {
        let c = cfg("2026-02-01", 21, 5);
        // Day 22 of the cycle is the first break day
        let info = cycle_info(&c, date(2026, 2, 22));
        assert!(info.is_break);
        assert_eq!(info.cycle_day, 22);
        assert_eq!(info.study_day, 0);

        // Day 26 is the last break day; day 27 rolls into cycle 2
        assert!(cycle_info(&c, date(2026, 2, 26)).is_break);
        let next = cycle_info(&c, date(2026, 2, 27));
        assert_eq!(next.cycle_number, 2);
        assert_eq!(next.cycle_day, 1);
        assert!(!next.is_break);
        assert_eq!(next.cycle_start, date(2026, 2, 27));
    }

    #[test]
    fn test_before_start() {
        let info = cycle_info(&cfg("2026-02-01", 21, 5), date(2026, 1, 20));
        assert!(info.before_start);
        assert!(info.is_break);
        assert_eq!(info.cycle_day, 0);
        assert_eq!(info.study_day, 0);
        assert_eq!(info.cycle_number, 0);
    }

    #[test]
    fn test_unset_start_uses_jan_first() {
        let info = cycle_info(&cfg("", 21, 5), date(2026, 1, 1));
        assert!(info.implicit_start);
        assert_eq!(info.cycle_number, 1);
        assert_eq!(info.cycle_day, 1);
        assert_eq!(info.study_day, 1);
        assert!(!info.is_break);
    }

    #[test]
    fn test_malformed_start_treated_as_unset() {
        let good = cycle_info(&cfg("", 21, 5), date(2026, 3, 15));
        for bad in ["not-a-date", "2026/02/01", "2026-13-40"] {
            let info = cycle_info(&cfg(bad, 21, 5), date(2026, 3, 15));
            assert!(info.implicit_start, "{bad} should fall back");
            assert_eq!(info.cycle_day, good.cycle_day);
        }
    }

    #[test]
    fn test_effective_day_override() {
        let mut c = cfg("2026-02-01", 21, 5);
        c.override_enabled = true;
        c.override_day = 7;
        assert_eq!(effective_study_day(&c, date(2026, 2, 24)), 7);

        c.override_day = 99;
        assert_eq!(effective_study_day(&c, date(2026, 2, 24)), 31);
    }

    #[test]
    fn test_effective_day_break_is_zero() {
        let c = cfg("2026-02-01", 21, 5);
        assert_eq!(effective_study_day(&c, date(2026, 2, 23)), 0);
        assert_eq!(effective_study_day(&c, date(2026, 2, 10)), 10);
    }

    proptest! {
        /// Pure: same inputs, same answer; and is_break iff past study_days.
        #[test]
        fn prop_cycle_deterministic(
            offset in 0u64..2000,
            study in 1u32..60,
            brk in 0u32..30,
        ) {
            let c = cfg("2025-06-15", study, brk);
            let d = add_days(date(2025, 6, 15), offset);
            let a = cycle_info(&c, d);
            let b = cycle_info(&c, d);
            prop_assert_eq!(a, b);
            prop_assert_eq!(a.is_break, a.cycle_day > study);
            prop_assert!(a.cycle_day >= 1 && a.cycle_day <= study + brk);
            prop_assert!(a.cycle_start <= d && d <= a.cycle_end);
        }
    }
}
