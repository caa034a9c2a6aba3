//! Trend helpers for the alert policy

/// Fewest points a trend is fitted on
pub const MIN_TREND_POINTS: usize = 3;

/// Calculate linear regression slope for trend detection
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// Project the last value `horizon` steps ahead along the fitted slope
///
/// Returns `None` when there are too few points to call it a trend.
pub fn project(values: &[f64], horizon: usize) -> Option<f64> {
    if values.len() < MIN_TREND_POINTS {
        return None;
    }
    let last = *values.last()?;
    Some(last + linear_regression_slope(values) * horizon as f64)
}

/// Length of the run of values satisfying `pred` that ends at the last element
pub fn trailing_run(values: &[f64], pred: impl Fn(f64) -> bool) -> usize {
    values.iter().rev().take_while(|&&v| pred(v)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_regression_slope() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((linear_regression_slope(&values) - 1.0).abs() < 0.01);
        assert_eq!(linear_regression_slope(&[]), 0.0);
        assert_eq!(linear_regression_slope(&[3.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn test_project() {
        assert_eq!(project(&[50.0, 60.0], 10), None);
        let projected = project(&[50.0, 60.0, 70.0, 80.0], 10).unwrap();
        assert!((projected - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_trailing_run() {
        let values = [95.0, 50.0, 91.0, 93.0, 97.0];
        assert_eq!(trailing_run(&values, |v| v >= 90.0), 3);
        assert_eq!(trailing_run(&values, |v| v < 10.0), 0);
        assert_eq!(trailing_run(&[], |_| true), 0);
    }
}
