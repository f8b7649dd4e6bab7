//! Percentile calculations for run score series.
//!
//! Multi-run audits produce a short series of performance scores. This
//! module summarizes that series so reports can show how noisy the
//! measurement was next to the mean.

use serde::{Deserialize, Serialize};

/// Calculate percentile value from a slice of f64 samples.
///
/// Uses linear interpolation between nearest ranks.
///
/// # Returns
///
/// * `Some(value)` - The percentile value
/// * `None` - If samples is empty or p is outside 0.0..=100.0
///
/// # Examples
///
/// ```
/// use pagespeed_harness::stats::percentiles::percentile;
///
/// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(percentile(&data, 50.0), Some(3.0));
/// ```
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    if samples.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if sorted.len() == 1 {
        return Some(sorted[0]);
    }

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower_index = rank.floor() as usize;
    let upper_index = rank.ceil() as usize;

    if lower_index == upper_index {
        Some(sorted[lower_index])
    } else {
        let lower_value = sorted[lower_index];
        let upper_value = sorted[upper_index];
        let fraction = rank - lower_index as f64;
        Some(lower_value + fraction * (upper_value - lower_value))
    }
}

/// Spread of a run score series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub min: f64,
    pub median: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator)
    pub std_dev: f64,
    pub count: usize,
}

impl ScoreSummary {
    /// Summarize `samples`, in run order or not
    ///
    /// # Examples
    ///
    /// ```
    /// use pagespeed_harness::stats::percentiles::ScoreSummary;
    ///
    /// let summary = ScoreSummary::from_samples(&[88.0, 92.0, 90.0]).unwrap();
    /// assert_eq!(summary.count, 3);
    /// assert_eq!(summary.median, 90.0);
    /// assert_eq!(summary.mean, 90.0);
    /// ```
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let count = samples.len();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = samples.iter().sum::<f64>() / count as f64;

        let variance = if count > 1 {
            let squared_diffs: f64 = samples.iter().map(|&x| (x - mean).powi(2)).sum();
            squared_diffs / (count - 1) as f64
        } else {
            0.0
        };

        Some(ScoreSummary {
            min,
            median: percentile(samples, 50.0)?,
            max,
            mean,
            std_dev: variance.sqrt(),
            count,
        })
    }

    /// Coefficient of variation (std_dev / mean), `f64::INFINITY` for a zero mean
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            f64::INFINITY
        } else {
            self.std_dev / self.mean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_empty_samples() {
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_percentile_single_sample() {
        let samples = vec![42.0];
        assert_eq!(percentile(&samples, 50.0), Some(42.0));
        assert_eq!(percentile(&samples, 0.0), Some(42.0));
        assert_eq!(percentile(&samples, 100.0), Some(42.0));
    }

    #[test]
    fn test_percentile_invalid_p() {
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(percentile(&samples, -1.0), None);
        assert_eq!(percentile(&samples, 101.0), None);
    }

    #[test]
    fn test_percentile_with_interpolation() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];

        let p25 = percentile(&samples, 25.0).unwrap();
        assert!((p25 - 3.25).abs() < 1e-10);

        let p50 = percentile(&samples, 50.0).unwrap();
        assert!((p50 - 5.5).abs() < 1e-10);
    }

    #[test]
    fn test_percentile_unsorted_samples() {
        let samples = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(percentile(&samples, 50.0), Some(3.0));
    }

    #[test]
    fn test_summary_empty() {
        assert!(ScoreSummary::from_samples(&[]).is_none());
    }

    #[test]
    fn test_summary_constant_series() {
        let summary = ScoreSummary::from_samples(&[90.0; 5]).unwrap();

        assert_eq!(summary.count, 5);
        assert_eq!(summary.min, 90.0);
        assert_eq!(summary.max, 90.0);
        assert_eq!(summary.mean, 90.0);
        assert_eq!(summary.std_dev, 0.0);
        assert_eq!(summary.coefficient_of_variation(), 0.0);
    }

    #[test]
    fn test_summary_mean_and_std_dev() {
        let samples = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let summary = ScoreSummary::from_samples(&samples).unwrap();

        assert_eq!(summary.mean, 5.0);
        assert_eq!(summary.median, 4.5);

        // (9+1+1+1+0+0+4+16)/7
        let expected_std_dev = (32.0_f64 / 7.0).sqrt();
        assert!((summary.std_dev - expected_std_dev).abs() < 1e-10);
    }

    #[test]
    fn test_coefficient_of_variation_zero_mean() {
        let summary = ScoreSummary {
            min: 0.0,
            median: 0.0,
            max: 0.0,
            mean: 0.0,
            std_dev: 0.0,
            count: 3,
        };
        assert_eq!(summary.coefficient_of_variation(), f64::INFINITY);
    }
}
