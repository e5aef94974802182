//! Summary Statistics
//!
//! Mean, median and sample standard deviation over the measured builds of
//! one column. Failed invocations leave no sample; a column without any
//! sample reports `NaN` for all three.

/// Arithmetic mean; `NaN` when no samples were recorded.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Median; `NaN` when no samples were recorded.
pub fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation; `NaN` when no samples were recorded, 0 for a
/// single sample.
pub fn std_dev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = mean(samples);
    let variance =
        samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_statistics() {
        let samples = [100.0, 102.0, 98.0, 101.0, 99.0];
        assert!((mean(&samples) - 100.0).abs() < 1e-9);
        assert!((median(&samples) - 100.0).abs() < 1e-9);
        assert!(std_dev(&samples) > 0.0);
    }

    #[test]
    fn even_sample_median_averages_the_middle() {
        assert!((median(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn empty_samples_are_nan() {
        assert!(mean(&[]).is_nan());
        assert!(median(&[]).is_nan());
        assert!(std_dev(&[]).is_nan());
    }

    #[test]
    fn single_sample_has_zero_spread() {
        assert!((std_dev(&[42.0]) - 0.0).abs() < f64::EPSILON);
        assert!((mean(&[42.0]) - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nan_formats_as_csv_literal() {
        assert_eq!(format!("{:.2}", mean(&[])), "NaN");
    }
}
