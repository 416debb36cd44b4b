//! Clock and window arithmetic
//!
//! All persisted timestamps are UTC. The application carries a single
//! configurable timezone (IANA name); naive local inputs are interpreted in
//! that zone and converted to UTC before any comparison. Scoring and
//! conflict detection both work on the `Window` type defined here.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::utils::errors::{Result, SigeaError};

/// A half-open-agnostic UTC interval. Inverted windows are treated as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Length of the window, zero when inverted.
    pub fn duration(&self) -> Duration {
        if self.is_empty() {
            Duration::zero()
        } else {
            self.end - self.start
        }
    }

    /// Overlap duration with another window: max(0, min(ends) - max(starts)).
    pub fn overlap(&self, other: &Window) -> Duration {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end > start {
            end - start
        } else {
            Duration::zero()
        }
    }

    /// The intersection window, if any time is shared.
    pub fn intersect(&self, other: &Window) -> Option<Window> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end > start {
            Some(Window::new(start, end))
        } else {
            None
        }
    }
}

/// Resolve an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| SigeaError::Config(format!("unknown timezone '{name}'")))
}

/// Parse an ISO-8601 timestamp carrying an explicit offset. Naive strings
/// are rejected at the boundary.
pub fn parse_wire_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            SigeaError::InvalidInput(format!(
                "timestamp '{value}' must be ISO-8601 with a timezone offset"
            ))
        })
}

/// Interpret a naive local datetime in the application timezone.
///
/// Ambiguous instants (fall-back fold) resolve to the earliest reading.
/// Nonexistent instants (spring-forward gap) shift to the first valid
/// local time after the gap.
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}

/// Number of local calendar dates a window touches.
pub fn span_days(window: &Window, tz: Tz) -> i64 {
    if window.is_empty() {
        return 0;
    }
    let first = window.start.with_timezone(&tz).date_naive();
    let last = window.end.with_timezone(&tz).date_naive();
    (last - first).num_days() + 1
}

/// Partition a window into per-date sub-windows in the application timezone.
///
/// Boundary days are clamped to the actual start/end instants; interior days
/// use the window's local time-of-day. An interior day whose derived slot is
/// inverted (end time-of-day at or before start time-of-day) contributes
/// nothing.
pub fn per_date_windows(window: &Window, tz: Tz) -> Vec<(NaiveDate, Window)> {
    if window.is_empty() {
        return Vec::new();
    }

    let start_local = window.start.with_timezone(&tz);
    let end_local = window.end.with_timezone(&tz);
    let start_tod = start_local.time();
    let end_tod = end_local.time();

    let mut out = Vec::new();
    let mut date = start_local.date_naive();
    let last = end_local.date_naive();

    while date <= last {
        let slot_start = local_to_utc(date.and_time(start_tod), tz).max(window.start);
        let slot_end = local_to_utc(date.and_time(end_tod), tz).min(window.end);
        let slot = Window::new(slot_start, slot_end);
        if !slot.is_empty() {
            out.push((date, slot));
        }
        date += Duration::days(1);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_overlap_duration() {
        let a = Window::new(utc(2025, 3, 1, 10, 0), utc(2025, 3, 1, 12, 0));
        let b = Window::new(utc(2025, 3, 1, 11, 0), utc(2025, 3, 1, 13, 0));
        assert_eq!(a.overlap(&b), Duration::hours(1));
        assert_eq!(b.overlap(&a), Duration::hours(1));
    }

    #[test]
    fn test_touching_windows_do_not_overlap() {
        let a = Window::new(utc(2025, 3, 1, 10, 0), utc(2025, 3, 1, 12, 0));
        let b = Window::new(utc(2025, 3, 1, 12, 0), utc(2025, 3, 1, 14, 0));
        assert_eq!(a.overlap(&b), Duration::zero());
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let w = Window::new(utc(2025, 3, 1, 12, 0), utc(2025, 3, 1, 10, 0));
        assert!(w.is_empty());
        assert_eq!(w.duration(), Duration::zero());
    }

    #[test]
    fn test_parse_wire_timestamp_requires_offset() {
        assert!(parse_wire_timestamp("2025-03-01T10:00:00-06:00").is_ok());
        assert!(parse_wire_timestamp("2025-03-01T16:00:00Z").is_ok());
        assert!(parse_wire_timestamp("2025-03-01T10:00:00").is_err());
        assert!(parse_wire_timestamp("2025-03-01 10:00:00").is_err());
    }

    #[test]
    fn test_wire_offsets_normalize_to_utc() {
        let a = parse_wire_timestamp("2025-03-01T10:00:00-06:00").unwrap();
        let b = parse_wire_timestamp("2025-03-01T16:00:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ambiguous_local_time_resolves_earliest() {
        // Mexico City fell back 2:00 -> 1:00 on 2022-10-30; 01:30 happened twice.
        let tz: Tz = "America/Mexico_City".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2022, 10, 30)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let resolved = local_to_utc(naive, tz);
        // Earliest reading is still on CDT (UTC-5): 06:30 UTC, not 07:30.
        assert_eq!(resolved, utc(2022, 10, 30, 6, 30));
    }

    #[test]
    fn test_nonexistent_local_time_shifts_forward() {
        // Mexico City sprang forward 2:00 -> 3:00 on 2022-04-03; 02:30 never existed.
        let tz: Tz = "America/Mexico_City".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2022, 4, 3)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let resolved = local_to_utc(naive, tz);
        let first_valid = NaiveDate::from_ymd_opt(2022, 4, 3)
            .unwrap()
            .and_hms_opt(3, 30, 0)
            .unwrap();
        assert_eq!(resolved, local_to_utc(first_valid, tz));
    }

    #[test]
    fn test_per_date_windows_multi_day() {
        // Mon 09:00 - Wed 17:00 local, in UTC for simplicity.
        let tz: Tz = "UTC".parse().unwrap();
        let w = Window::new(utc(2025, 3, 3, 9, 0), utc(2025, 3, 5, 17, 0));
        let parts = per_date_windows(&w, tz);
        assert_eq!(parts.len(), 3);

        let (d0, s0) = parts[0];
        assert_eq!(d0, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(s0, Window::new(utc(2025, 3, 3, 9, 0), utc(2025, 3, 3, 17, 0)));

        let (d1, s1) = parts[1];
        assert_eq!(d1, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(s1, Window::new(utc(2025, 3, 4, 9, 0), utc(2025, 3, 4, 17, 0)));

        let (d2, s2) = parts[2];
        assert_eq!(d2, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap());
        assert_eq!(s2, Window::new(utc(2025, 3, 5, 9, 0), utc(2025, 3, 5, 17, 0)));
    }

    #[test]
    fn test_per_date_windows_single_day_is_unchanged() {
        let tz: Tz = "UTC".parse().unwrap();
        let w = Window::new(utc(2025, 3, 3, 10, 0), utc(2025, 3, 3, 12, 0));
        let parts = per_date_windows(&w, tz);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].1, w);
    }

    #[test]
    fn test_per_date_windows_overnight_interior_days_empty() {
        // 22:00 -> 02:00 three days later: the derived daily slot is inverted,
        // so interior dates contribute nothing.
        let tz: Tz = "UTC".parse().unwrap();
        let w = Window::new(utc(2025, 3, 3, 22, 0), utc(2025, 3, 6, 2, 0));
        let parts = per_date_windows(&w, tz);
        let dates: Vec<NaiveDate> = parts.iter().map(|(d, _)| *d).collect();
        assert!(dates.contains(&NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()));
        assert!(dates.contains(&NaiveDate::from_ymd_opt(2025, 3, 6).unwrap()));
        assert!(!dates.contains(&NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()));
        assert!(!dates.contains(&NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()));
    }

    #[test]
    fn test_span_days() {
        let tz: Tz = "UTC".parse().unwrap();
        let single = Window::new(utc(2025, 3, 3, 10, 0), utc(2025, 3, 3, 12, 0));
        assert_eq!(span_days(&single, tz), 1);
        let multi = Window::new(utc(2025, 3, 3, 9, 0), utc(2025, 3, 5, 17, 0));
        assert_eq!(span_days(&multi, tz), 3);
    }

    #[test]
    fn test_window_time_of_day_helpers() {
        let tz: Tz = "UTC".parse().unwrap();
        let w = Window::new(utc(2025, 3, 3, 9, 30), utc(2025, 3, 5, 17, 45));
        let parts = per_date_windows(&w, tz);
        let (_, interior) = parts[1];
        assert_eq!(
            interior.start.with_timezone(&tz).time(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            interior.end.with_timezone(&tz).time(),
            NaiveTime::from_hms_opt(17, 45, 0).unwrap()
        );
    }
}
