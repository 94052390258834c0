//! Statistical utility functions.

use statrs::statistics::{Data, OrderStatistics};

/// Minimum and maximum of the finite values in a slice.
///
/// Returns `None` if there are no finite values.
///
/// # Example
/// ```
/// use cytoflow_kmeans::utils::finite_range;
///
/// assert_eq!(finite_range(&[3.0, f64::NAN, -1.0, 2.0]), Some((-1.0, 3.0)));
/// assert_eq!(finite_range(&[f64::NAN]), None);
/// ```
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(None, |acc, x| match acc {
            None => Some((x, x)),
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
        })
}

/// The `p`-th percentile (0..=100) of the finite values in a slice.
///
/// Returns NaN if there are no finite values.
pub fn percentile(values: &[f64], p: usize) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    let mut data = Data::new(finite);
    data.percentile(p.min(100))
}
