//! Windowed statistics
//!
//! Read-only summaries over the training log and the lung-capacity log:
//! entry counts, label histograms, lung-capacity mean/max/recent values
//! and a first-week versus last-week trend.

mod aggregator;

pub use aggregator::{Aggregator, LungSummary, Summary};

use serde::Serialize;
use std::fmt;

/// Values compared at each end of a series
pub const TREND_WINDOW: usize = 7;

/// Direction of a series over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    /// Fewer than two full windows of values
    InsufficientData,
}

impl Trend {
    /// Compare the mean of the first [`TREND_WINDOW`] values with the mean
    /// of the last [`TREND_WINDOW`]
    pub fn classify(values: &[f64]) -> Trend {
        if values.len() < 2 * TREND_WINDOW {
            return Trend::InsufficientData;
        }

        let first = mean(&values[..TREND_WINDOW]);
        let last = mean(&values[values.len() - TREND_WINDOW..]);

        if last > first {
            Trend::Improving
        } else if last < first {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient data",
        };
        f.write_str(label)
    }
}

/// Arithmetic mean; zero for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_needs_two_windows() {
        let values: Vec<f64> = (0..13).map(f64::from).collect();
        assert_eq!(Trend::classify(&values), Trend::InsufficientData);
        assert_eq!(Trend::classify(&[]), Trend::InsufficientData);
    }

    #[test]
    fn test_trend_directions() {
        let rising: Vec<f64> = (0..14).map(|i| 6000.0 + 10.0 * i as f64).collect();
        assert_eq!(Trend::classify(&rising), Trend::Improving);

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(Trend::classify(&falling), Trend::Declining);

        assert_eq!(Trend::classify(&[6500.0; 20]), Trend::Stable);
    }

    #[test]
    fn test_trend_ignores_middle() {
        // Middle values do not matter, only the two windows
        let mut values = vec![6000.0; 7];
        values.extend([9000.0; 5]);
        values.extend([6100.0; 7]);
        assert_eq!(Trend::classify(&values), Trend::Improving);
    }

    #[test]
    fn test_display() {
        assert_eq!(Trend::InsufficientData.to_string(), "insufficient data");
        assert_eq!(Trend::Improving.to_string(), "improving");
    }
}
