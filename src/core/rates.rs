//! Rate computation over action histories.
//!
//! All functions here are read-only over the histories; the recorder calls
//! them while holding its lock.

use crate::core::history::ActionHistory;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of the sliding window used for current rates.
pub const RATE_WINDOW_SECS: i64 = 60;

/// Number of entries recorded within the trailing rate window.
pub fn current_rate(history: &ActionHistory, now: DateTime<Utc>) -> usize {
    history.count_after(now - Duration::seconds(RATE_WINDOW_SECS))
}

/// Lifetime average actions per minute since `start`.
///
/// Returns 0 when no time has elapsed (or the clock went backwards).
pub fn average_rate(history: &ActionHistory, now: DateTime<Utc>, start: DateTime<Utc>) -> f64 {
    let elapsed_ms = (now - start).num_milliseconds();
    if elapsed_ms <= 0 {
        return 0.0;
    }
    let elapsed_minutes = elapsed_ms as f64 / 60_000.0;
    history.len() as f64 / elapsed_minutes
}

/// Highest current rates seen by the consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakTracker {
    pub apm: usize,
    pub eapm: usize,
}

impl PeakTracker {
    /// Raise the peaks if the current rates exceed them.
    pub fn observe(&mut self, current_apm: usize, current_eapm: usize) {
        self.apm = self.apm.max(current_apm);
        self.eapm = self.eapm.max(current_eapm);
    }
}

/// All rates shown to the user at one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateReport {
    pub current_apm: usize,
    pub current_eapm: usize,
    pub average_apm: f64,
    pub average_eapm: f64,
    pub peak_apm: usize,
    pub peak_eapm: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_current_rate_uses_trailing_minute() {
        let mut history = ActionHistory::new(10);
        for secs_ago in [65, 40, 10] {
            history.push(now() - Duration::seconds(secs_ago));
        }
        assert_eq!(current_rate(&history, now()), 2);
    }

    #[test]
    fn test_entry_exactly_a_minute_old_is_excluded() {
        let mut history = ActionHistory::new(10);
        history.push(now() - Duration::seconds(60));
        assert_eq!(current_rate(&history, now()), 0);
    }

    #[test]
    fn test_average_rate_zero_guard() {
        let mut history = ActionHistory::new(10);
        history.push(now());
        assert_eq!(average_rate(&history, now(), now()), 0.0);
        assert_eq!(
            average_rate(&history, now(), now() + Duration::seconds(5)),
            0.0
        );
    }

    #[test]
    fn test_average_rate_per_minute() {
        let mut history = ActionHistory::new(100);
        for i in 0..30 {
            history.push(now() + Duration::seconds(i));
        }
        let avg = average_rate(&history, now() + Duration::seconds(120), now());
        assert!((avg - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_peaks_never_decrease() {
        let mut peaks = PeakTracker::default();
        peaks.observe(10, 4);
        peaks.observe(7, 6);
        assert_eq!(peaks, PeakTracker { apm: 10, eapm: 6 });
    }
}
