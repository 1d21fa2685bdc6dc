//! Summary statistics over a sorted sequence.

use serde::Serialize;

use super::{NumericSequence, SortKey};
use crate::error::{SortError, SortResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics<T> {
    pub count: usize,
    pub min: T,
    pub max: T,
    pub mean: f64,
    pub median: f64,
}

/// Reduce the first `n` elements of an ascending `sorted` slice.
///
/// Elements at `[n, len)` are padding and never read.
pub fn reduce<T: SortKey>(sorted: &[T], n: usize) -> SortResult<Statistics<T>> {
    if n == 0 {
        return Err(SortError::InvalidInput(
            "cannot reduce an empty dataset".to_string(),
        ));
    }
    if n > sorted.len() {
        return Err(SortError::InvalidInput(format!(
            "dataset of {} values does not fit a sorted buffer of {}",
            n,
            sorted.len()
        )));
    }

    let values = &sorted[..n];
    let sum: f64 = values.iter().map(|v| v.to_f64()).sum();
    let median = if n % 2 == 1 {
        values[n / 2].to_f64()
    } else {
        (values[n / 2 - 1].to_f64() + values[n / 2].to_f64()) / 2.0
    };

    Ok(Statistics {
        count: n,
        min: values[0],
        max: values[n - 1],
        mean: sum / n as f64,
        median,
    })
}

/// Statistics of the unsorted input, computed from a host-side sort.
pub fn baseline<T: SortKey>(sequence: &NumericSequence<T>) -> SortResult<Statistics<T>> {
    reduce(&sequence.sorted(), sequence.len())
}
