//! Per-second activity bins for the rolling bar chart.
//!
//! Bin 0 holds the most recent second, bin `n` the actions that happened
//! between `n` and `n + 1` seconds ago.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Chart range choices offered to the user, in seconds.
pub const GRAPH_TIME_RANGE_OPTIONS: [u64; 4] = [30, 60, 120, 300];

/// Per-second action counts over a trailing range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityBins {
    pub range_secs: usize,
    pub apm: Vec<u32>,
    pub eapm: Vec<u32>,
}

/// Distribution of per-second APM counts in a set of bins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub mean: f64,
    pub std_dev: f64,
    pub max: f64,
}

impl ActivityBins {
    /// Bin both timestamp sequences relative to `now`.
    pub fn compute<'a, A, E>(actions: A, effective: E, now: DateTime<Utc>, range_secs: usize) -> Self
    where
        A: IntoIterator<Item = &'a DateTime<Utc>>,
        E: IntoIterator<Item = &'a DateTime<Utc>>,
    {
        Self {
            range_secs,
            apm: fill_bins(actions, now, range_secs),
            eapm: fill_bins(effective, now, range_secs),
        }
    }

    /// Largest count in either series.
    pub fn peak(&self) -> u32 {
        self.apm
            .iter()
            .chain(self.eapm.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Upper bound for the chart's y axis: 10% headroom over the peak,
    /// at least 1, never above `cap`.
    pub fn y_max(&self, cap: u32) -> f64 {
        (self.peak() as f64 * 1.1).max(1.0).min(cap as f64)
    }

    /// Summary statistics of the APM series.
    pub fn summary(&self) -> ActivitySummary {
        if self.apm.is_empty() {
            return ActivitySummary::default();
        }

        let values: Vec<f64> = self.apm.iter().map(|&c| c as f64).collect();
        ActivitySummary {
            mean: values.iter().mean(),
            std_dev: values.iter().population_std_dev(),
            max: Statistics::max(values.iter()),
        }
    }
}

fn fill_bins<'a, I>(timestamps: I, now: DateTime<Utc>, range_secs: usize) -> Vec<u32>
where
    I: IntoIterator<Item = &'a DateTime<Utc>>,
{
    let mut bins = vec![0u32; range_secs];
    let range_ms = range_secs as i64 * 1000;

    for &timestamp in timestamps {
        let age_ms = (now - timestamp).num_milliseconds();
        if !(0..=range_ms).contains(&age_ms) {
            continue;
        }
        let index = (age_ms / 1000) as usize;
        if let Some(bin) = bins.get_mut(index) {
            *bin += 1;
        }
    }

    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn ago_ms(ms: i64) -> DateTime<Utc> {
        now() - Duration::milliseconds(ms)
    }

    #[test]
    fn test_binning_by_age() {
        let actions = vec![ago_ms(100), ago_ms(900), ago_ms(1_500), ago_ms(9_999)];
        let effective = vec![ago_ms(900)];
        let bins = ActivityBins::compute(&actions, &effective, now(), 10);

        assert_eq!(bins.apm, vec![2, 1, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(bins.eapm, vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let future = now() + Duration::seconds(1);
        let actions = vec![ago_ms(10_000), ago_ms(30_000), future];
        let none: Vec<DateTime<Utc>> = Vec::new();
        let bins = ActivityBins::compute(&actions, &none, now(), 10);
        assert_eq!(bins.peak(), 0);
    }

    #[test]
    fn test_y_axis_bounds() {
        let none: Vec<DateTime<Utc>> = Vec::new();
        let empty = ActivityBins::compute(&none, &none, now(), 5);
        assert_eq!(empty.y_max(50), 1.0);

        let actions: Vec<_> = (0..20).map(|_| ago_ms(200)).collect();
        let busy = ActivityBins::compute(&actions, &none, now(), 5);
        assert!((busy.y_max(50) - 22.0).abs() < 1e-9);
        assert_eq!(busy.y_max(10), 10.0);
    }

    #[test]
    fn test_summary() {
        let bins = ActivityBins {
            range_secs: 4,
            apm: vec![2, 4, 4, 6],
            eapm: vec![0; 4],
        };
        let summary = bins.summary();
        assert!((summary.mean - 4.0).abs() < 1e-9);
        assert!((summary.std_dev - 2.0_f64.sqrt()).abs() < 1e-9);
        assert_eq!(summary.max, 6.0);
    }
}
