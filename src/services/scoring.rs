//! Attendance scoring
//!
//! Pure computation of the presence percentage and discrete status for one
//! attendance, given the activity's scheduled window and the recorded pause
//! list. No storage access happens here; callers load the rows and persist
//! the result.

use chrono::{DateTime, Duration, Utc};

use crate::models::attendance::{AttendancePause, AttendanceStatus};
use crate::utils::time::Window;

/// Attendance percentage at or above this is full credit
pub const FULL_CREDIT_THRESHOLD: f64 = 80.0;

/// One pause window as seen by the scorer. Open pauses carry `end = None`
/// and close at the presence end or the evaluation instant.
#[derive(Debug, Clone, Copy)]
pub struct PauseSpan {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl From<&AttendancePause> for PauseSpan {
    fn from(pause: &AttendancePause) -> Self {
        Self {
            start: pause.paused_at,
            end: pause.resumed_at,
        }
    }
}

/// Inputs to one score evaluation
#[derive(Debug, Clone)]
pub struct ScoreInput<'a> {
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
    /// The scheduled window `[start_dt, start_dt + duration_hours]`
    pub scheduled: Window,
    pub pauses: &'a [PauseSpan],
    /// Evaluation instant closing any interval the row leaves open. Passing
    /// it explicitly keeps recomputation deterministic.
    pub as_of: DateTime<Utc>,
}

/// A computed outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub percentage: f64,
    pub status: AttendanceStatus,
}

/// Compute percentage and status for one attendance.
///
/// The presence interval is clamped to the scheduled window, pause overlap
/// inside that clamp is subtracted, and the result is rounded to two
/// decimals before the status thresholds apply. A single pause lasting at
/// least the scheduled duration is absence outright, however the remaining
/// slices add up.
pub fn compute_score(input: &ScoreInput<'_>) -> Score {
    let expected = input.scheduled.duration();
    if expected <= Duration::zero() {
        return Score {
            percentage: 100.0,
            status: AttendanceStatus::Asistio,
        };
    }

    let presence_end = input.check_out.unwrap_or(input.as_of);
    let presence = Window::new(input.check_in, presence_end);

    let window = match presence.intersect(&input.scheduled) {
        Some(window) => window,
        None => {
            return Score {
                percentage: 0.0,
                status: AttendanceStatus::Ausente,
            }
        }
    };

    let mut paused_in_window = Duration::zero();
    for pause in input.pauses {
        let pause_end = pause.end.or(input.check_out).unwrap_or(input.as_of);
        let span = Window::new(pause.start, pause_end);

        if span.duration() >= expected {
            return Score {
                percentage: 0.0,
                status: AttendanceStatus::Ausente,
            };
        }

        paused_in_window = paused_in_window + span.overlap(&window);
    }

    let net = (window.duration() - paused_in_window).max(Duration::zero());
    let raw = 100.0 * net.num_milliseconds() as f64 / expected.num_milliseconds() as f64;
    let percentage = (raw * 100.0).round() / 100.0;
    let percentage = percentage.clamp(0.0, 100.0);

    Score {
        percentage,
        status: status_for(percentage),
    }
}

/// Status thresholds over the rounded percentage
pub fn status_for(percentage: f64) -> AttendanceStatus {
    if percentage >= FULL_CREDIT_THRESHOLD {
        AttendanceStatus::Asistio
    } else if percentage > 0.0 {
        AttendanceStatus::Parcial
    } else {
        AttendanceStatus::Ausente
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, mi, 0).unwrap()
    }

    fn one_hour_window() -> Window {
        Window::new(utc(10, 0), utc(11, 0))
    }

    #[test]
    fn test_full_attendance() {
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: Some(utc(11, 0)),
            scheduled: one_hour_window(),
            pauses: &[],
            as_of: utc(11, 0),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 100.0);
        assert_eq!(score.status, AttendanceStatus::Asistio);
    }

    #[test]
    fn test_half_attendance() {
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: Some(utc(10, 30)),
            scheduled: one_hour_window(),
            pauses: &[],
            as_of: utc(10, 30),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 50.0);
        assert_eq!(score.status, AttendanceStatus::Parcial);
    }

    #[test]
    fn test_attendance_with_short_pause() {
        let pauses = [PauseSpan {
            start: utc(10, 20),
            end: Some(utc(10, 35)),
        }];
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: Some(utc(11, 0)),
            scheduled: one_hour_window(),
            pauses: &pauses,
            as_of: utc(11, 0),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 75.0);
        assert_eq!(score.status, AttendanceStatus::Parcial);
    }

    #[test]
    fn test_pause_longer_than_activity_is_absence() {
        // 15-minute activity, pause from 10:01 to 11:00.
        let scheduled = Window::new(utc(10, 0), utc(10, 15));
        let pauses = [PauseSpan {
            start: utc(10, 1),
            end: Some(utc(11, 0)),
        }];
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: Some(utc(10, 15)),
            scheduled,
            pauses: &pauses,
            as_of: utc(10, 15),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 0.0);
        assert_eq!(score.status, AttendanceStatus::Ausente);
    }

    #[test]
    fn test_spanning_pause_beats_wide_presence() {
        // Presence wider than the scheduled window on both sides does not
        // rescue a pause covering the whole scheduled duration.
        let scheduled = Window::new(utc(10, 0), utc(10, 15));
        let pauses = [PauseSpan {
            start: utc(9, 55),
            end: Some(utc(10, 20)),
        }];
        let input = ScoreInput {
            check_in: utc(9, 30),
            check_out: Some(utc(10, 45)),
            scheduled,
            pauses: &pauses,
            as_of: utc(10, 45),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 0.0);
        assert_eq!(score.status, AttendanceStatus::Ausente);
    }

    #[test]
    fn test_multiple_pauses_sum() {
        // Two 10-minute pauses inside a one-hour window: 40/60 minutes net.
        let pauses = [
            PauseSpan { start: utc(10, 10), end: Some(utc(10, 20)) },
            PauseSpan { start: utc(10, 40), end: Some(utc(10, 50)) },
        ];
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: Some(utc(11, 0)),
            scheduled: one_hour_window(),
            pauses: &pauses,
            as_of: utc(11, 0),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 66.67);
        assert_eq!(score.status, AttendanceStatus::Parcial);
    }

    #[test]
    fn test_open_pause_closes_at_check_out() {
        // Paused at 10:30, never resumed, checked out at 11:00: second half lost.
        let pauses = [PauseSpan { start: utc(10, 30), end: None }];
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: Some(utc(11, 0)),
            scheduled: one_hour_window(),
            pauses: &pauses,
            as_of: utc(11, 0),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 50.0);
        assert_eq!(score.status, AttendanceStatus::Parcial);
    }

    #[test]
    fn test_open_everything_closes_at_as_of() {
        // No check-out either: both presence and pause close at as_of.
        let pauses = [PauseSpan { start: utc(10, 45), end: None }];
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: None,
            scheduled: one_hour_window(),
            pauses: &pauses,
            as_of: utc(10, 50),
        };
        let score = compute_score(&input);
        // 45 of 60 minutes present, 5 paused: 40/60.
        assert_eq!(score.percentage, 66.67);
        assert_eq!(score.status, AttendanceStatus::Parcial);
    }

    #[test]
    fn test_presence_outside_window_is_absence() {
        let input = ScoreInput {
            check_in: utc(12, 0),
            check_out: Some(utc(13, 0)),
            scheduled: one_hour_window(),
            pauses: &[],
            as_of: utc(13, 0),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 0.0);
        assert_eq!(score.status, AttendanceStatus::Ausente);
    }

    #[test]
    fn test_zero_expected_duration_is_full_credit() {
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: Some(utc(11, 0)),
            scheduled: Window::new(utc(10, 0), utc(10, 0)),
            pauses: &[],
            as_of: utc(11, 0),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 100.0);
        assert_eq!(score.status, AttendanceStatus::Asistio);
    }

    #[test]
    fn test_eighty_percent_boundary() {
        // Exactly 48 of 60 minutes.
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: Some(utc(10, 48)),
            scheduled: one_hour_window(),
            pauses: &[],
            as_of: utc(10, 48),
        };
        let score = compute_score(&input);
        assert_eq!(score.percentage, 80.0);
        assert_eq!(score.status, AttendanceStatus::Asistio);
    }

    #[test]
    fn test_recompute_is_deterministic() {
        let pauses = [PauseSpan { start: utc(10, 20), end: Some(utc(10, 35)) }];
        let input = ScoreInput {
            check_in: utc(10, 0),
            check_out: Some(utc(11, 0)),
            scheduled: one_hour_window(),
            pauses: &pauses,
            as_of: utc(11, 0),
        };
        let first = compute_score(&input);
        let second = compute_score(&input);
        assert_eq!(first, second);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn minute(offset: i64) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(offset)
        }

        proptest! {
            #[test]
            fn percentage_in_range_and_status_consistent(
                check_in in 0i64..2000,
                presence_len in 0i64..2000,
                sched_start in 0i64..2000,
                sched_len in 0i64..2000,
                pause_start in 0i64..2000,
                pause_len in 0i64..2000,
            ) {
                let pauses = [PauseSpan {
                    start: minute(pause_start),
                    end: Some(minute(pause_start + pause_len)),
                }];
                let input = ScoreInput {
                    check_in: minute(check_in),
                    check_out: Some(minute(check_in + presence_len)),
                    scheduled: Window::new(minute(sched_start), minute(sched_start + sched_len)),
                    pauses: &pauses,
                    as_of: minute(4000),
                };
                let score = compute_score(&input);

                prop_assert!(score.percentage >= 0.0 && score.percentage <= 100.0);
                prop_assert_eq!(score.status, status_for(score.percentage));
            }

            #[test]
            fn pause_never_raises_score(
                presence_len in 1i64..2000,
                sched_len in 1i64..2000,
                pause_start in 0i64..2000,
                pause_len in 0i64..500,
            ) {
                let base = ScoreInput {
                    check_in: minute(0),
                    check_out: Some(minute(presence_len)),
                    scheduled: Window::new(minute(0), minute(sched_len)),
                    pauses: &[],
                    as_of: minute(4000),
                };
                let without_pause = compute_score(&base);

                let pauses = [PauseSpan {
                    start: minute(pause_start),
                    end: Some(minute(pause_start + pause_len)),
                }];
                let with_pause = compute_score(&ScoreInput { pauses: &pauses, ..base });

                prop_assert!(with_pause.percentage <= without_pause.percentage);
            }
        }
    }
}
