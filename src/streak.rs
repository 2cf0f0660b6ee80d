//! Streak calculation
//!
//! A streak is the count of consecutive calendar days with at least one
//! learning session, ending at today or yesterday. Pure function of the
//! session timestamps; nothing in the database stores a streak directly.

use chrono::{DateTime, Days, NaiveDate, Utc};

/// Compute the current streak from raw session timestamps (ms since epoch).
///
/// Input order is not assumed. Returns 0 when the most recent session day is
/// neither today nor yesterday.
pub fn compute_streak(session_timestamps_ms: &[i64]) -> u32 {
    compute_streak_at(session_timestamps_ms, Utc::now().date_naive())
}

/// Streak computation against an explicit "today" (deterministic variant)
pub fn compute_streak_at(session_timestamps_ms: &[i64], today: NaiveDate) -> u32 {
    let mut days: Vec<NaiveDate> = session_timestamps_ms
        .iter()
        .filter_map(|&ts| DateTime::from_timestamp_millis(ts))
        .map(|dt| dt.date_naive())
        .collect();
    days.sort_unstable();
    days.dedup();
    days.reverse();

    let Some(&most_recent) = days.first() else {
        return 0;
    };

    // Broken streak: no activity today or yesterday
    let yesterday = today
        .checked_sub_days(Days::new(1))
        .unwrap_or(today);
    if most_recent != today && most_recent != yesterday {
        return 0;
    }

    let mut count = 1u32;
    let mut expected = most_recent;
    for &day in &days[1..] {
        let Some(prev) = expected.checked_sub_days(Days::new(1)) else {
            break;
        };
        if day == prev {
            count += 1;
            expected = prev;
        } else {
            break;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(date: NaiveDate) -> i64 {
        date.and_hms_opt(10, 30, 0).unwrap().and_utc().timestamp_millis()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn day_minus(n: u64) -> NaiveDate {
        today().checked_sub_days(Days::new(n)).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(compute_streak_at(&[], today()), 0);
    }

    #[test]
    fn test_three_consecutive_days() {
        let input = [ts(today()), ts(day_minus(1)), ts(day_minus(2))];
        assert_eq!(compute_streak_at(&input, today()), 3);
    }

    #[test]
    fn test_gap_breaks_streak() {
        // today and today-2, no today-1: streak is just today
        let input = [ts(today()), ts(day_minus(2))];
        assert_eq!(compute_streak_at(&input, today()), 1);
    }

    #[test]
    fn test_stale_activity_is_zero() {
        let input = [ts(day_minus(2))];
        assert_eq!(compute_streak_at(&input, today()), 0);
    }

    #[test]
    fn test_streak_ending_yesterday_still_counts() {
        let input = [ts(day_minus(1)), ts(day_minus(2)), ts(day_minus(3))];
        assert_eq!(compute_streak_at(&input, today()), 3);
    }

    #[test]
    fn test_unsorted_input_with_duplicate_days() {
        let input = [
            ts(day_minus(2)),
            ts(today()),
            ts(day_minus(1)),
            // Second session on the same day must not double-count
            day_minus(1).and_hms_opt(22, 0, 0).unwrap().and_utc().timestamp_millis(),
        ];
        assert_eq!(compute_streak_at(&input, today()), 3);
    }
}
