//! Padding to the network's power-of-two length.

use tracing::debug;

use super::{NumericSequence, SortKey};
use crate::error::{SortError, SortResult};

/// Input values followed by sentinels up to a power-of-two length.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedSequence<T> {
    values: Vec<T>,
    original_len: usize,
}

impl<T: SortKey> PaddedSequence<T> {
    /// Total length, always a power of two.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of real values at the front of the sequence.
    pub fn original_len(&self) -> usize {
        self.original_len
    }

    pub fn sentinel_count(&self) -> usize {
        self.values.len() - self.original_len
    }

    /// Number of bitonic stages, i.e. `log2(len)`.
    pub fn stages(&self) -> u32 {
        self.values.len().trailing_zeros()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}

/// Smallest power of two that holds `n` elements.
pub fn padded_len(n: usize) -> usize {
    n.next_power_of_two()
}

/// Extend `sequence` with `T::SENTINEL` up to the next power of two.
pub fn pad<T: SortKey>(sequence: &NumericSequence<T>) -> SortResult<PaddedSequence<T>> {
    let n = sequence.len();
    if n == 0 {
        return Err(SortError::InvalidInput(
            "dataset is empty; nothing to sort".to_string(),
        ));
    }

    let target = padded_len(n);
    let mut values = Vec::with_capacity(target);
    values.extend_from_slice(sequence.as_slice());
    values.resize(target, T::SENTINEL);

    debug!(n, padded_len = target, sentinels = target - n, "padded input");

    Ok(PaddedSequence {
        values,
        original_len: n,
    })
}
