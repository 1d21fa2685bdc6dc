//! Bitonic sort pipeline -- padding, launch geometry, the sorting network,
//! profiling and the statistics reduction over the sorted result.

pub mod geometry;
pub mod network;
pub mod pad;
pub mod profile;
pub mod stats;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Element types the sorting network can order.
///
/// The type must be totally ordered over the values the loader accepts and
/// expose a sentinel that sorts after every such value.
pub trait SortKey:
    Copy + PartialOrd + fmt::Debug + fmt::Display + FromStr + Serialize + 'static
{
    /// Padding value; never reported in any statistic.
    const SENTINEL: Self;

    /// OpenCL C scalar type used to specialise the kernel.
    const CL_TYPE: &'static str;

    fn to_f64(self) -> f64;

    /// Lossy conversion used for synthetic datasets.
    fn from_sample(sample: f64) -> Self;

    /// False for values that break the total order (NaN).
    fn is_orderable(self) -> bool {
        true
    }
}

impl SortKey for i32 {
    const SENTINEL: Self = i32::MAX;
    const CL_TYPE: &'static str = "int";

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_sample(sample: f64) -> Self {
        sample.round() as i32
    }
}

impl SortKey for u32 {
    const SENTINEL: Self = u32::MAX;
    const CL_TYPE: &'static str = "uint";

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_sample(sample: f64) -> Self {
        sample.round().max(0.0) as u32
    }
}

impl SortKey for f32 {
    // +inf rather than f32::MAX so an input of +inf cannot land behind a sentinel.
    const SENTINEL: Self = f32::INFINITY;
    const CL_TYPE: &'static str = "float";

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_sample(sample: f64) -> Self {
        sample as f32
    }

    fn is_orderable(self) -> bool {
        !self.is_nan()
    }
}

/// The loaded dataset, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSequence<T> {
    values: Vec<T>,
}

impl<T: SortKey> NumericSequence<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<T> {
        self.values.last().copied()
    }

    /// Host-side ascending copy, used as the reference result.
    pub fn sorted(&self) -> Vec<T> {
        let mut values = self.values.clone();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values
    }
}

impl<T: SortKey> From<Vec<T>> for NumericSequence<T> {
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}
