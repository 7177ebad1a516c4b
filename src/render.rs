//! Terminal presentation of rates and activity.

use crate::core::activity::ActivityBins;
use crate::core::rates::RateReport;
use std::fmt::Write;

/// Full readout: current, peak and average rates.
pub fn render_readout(report: &RateReport) -> String {
    format!(
        "APM: {:>4} | eAPM: {:>4} | Peak: {}/{} | Avg: {:.1}/{:.1}",
        report.current_apm,
        report.current_eapm,
        report.peak_apm,
        report.peak_eapm,
        report.average_apm,
        report.average_eapm
    )
}

/// Single-line readout used in compact mode.
pub fn render_compact(report: &RateReport) -> String {
    format!("APM: {} | eAPM: {}", report.current_apm, report.current_eapm)
}

/// Render a text bar chart of the bins, oldest second on the left.
///
/// Each series gets `height` rows scaled to `bins.y_max(y_cap)`. Counts
/// above the axis maximum are clipped to the top row.
pub fn render_chart(bins: &ActivityBins, y_cap: u32, height: usize) -> String {
    let height = height.max(1);
    let y_max = bins.y_max(y_cap);
    let mut out = String::new();

    for (label, series) in [("APM", &bins.apm), ("eAPM", &bins.eapm)] {
        let _ = writeln!(out, "{label} (last {}s, max {:.0}/s)", bins.range_secs, y_max);

        let bar_heights: Vec<usize> = series
            .iter()
            .rev()
            .map(|&count| scaled_height(count, y_max, height))
            .collect();

        for row in (1..=height).rev() {
            out.push('|');
            for &bar in &bar_heights {
                out.push(if bar >= row { '#' } else { ' ' });
            }
            out.push('\n');
        }
        out.push('+');
        out.push_str(&"-".repeat(bar_heights.len()));
        out.push('\n');
    }

    let summary = bins.summary();
    let _ = write!(
        out,
        "mean {:.2}/s  std {:.2}  max {:.0}/s",
        summary.mean, summary.std_dev, summary.max
    );
    out
}

fn scaled_height(count: u32, y_max: f64, height: usize) -> usize {
    if count == 0 || y_max <= 0.0 {
        return 0;
    }
    let scaled = (count as f64 / y_max * height as f64).ceil() as usize;
    scaled.clamp(1, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RateReport {
        RateReport {
            current_apm: 120,
            current_eapm: 80,
            average_apm: 95.3,
            average_eapm: 60.0,
            peak_apm: 150,
            peak_eapm: 90,
        }
    }

    #[test]
    fn test_compact_readout() {
        assert_eq!(render_compact(&report()), "APM: 120 | eAPM: 80");
    }

    #[test]
    fn test_full_readout() {
        let text = render_readout(&report());
        assert!(text.contains("Peak: 150/90"));
        assert!(text.contains("Avg: 95.3/60.0"));
    }

    #[test]
    fn test_zero_readout() {
        assert_eq!(render_compact(&RateReport::default()), "APM: 0 | eAPM: 0");
    }

    #[test]
    fn test_chart_shape() {
        let bins = ActivityBins {
            range_secs: 4,
            apm: vec![4, 0, 2, 0],
            eapm: vec![1, 0, 0, 0],
        };
        let chart = render_chart(&bins, 50, 2);
        let lines: Vec<&str> = chart.lines().collect();

        // header, 2 rows, axis for each series, then the summary line
        assert_eq!(lines.len(), 9);
        // Oldest second on the left, newest on the right
        assert_eq!(lines[1], "|   #");
        assert_eq!(lines[2], "| # #");
        assert_eq!(lines[3], "+----");
        assert!(lines[8].starts_with("mean 1.50/s"));
    }

    #[test]
    fn test_chart_clips_to_cap() {
        let bins = ActivityBins {
            range_secs: 1,
            apm: vec![500],
            eapm: vec![0],
        };
        let chart = render_chart(&bins, 10, 3);
        assert!(chart.starts_with("APM (last 1s, max 10/s)"));
        assert_eq!(chart.lines().filter(|l| *l == "|#").count(), 3);
    }
}
