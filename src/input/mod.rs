//! Dataset loading -- whitespace-separated text records or synthetic samples.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::{SortError, SortResult};
use crate::sort::{NumericSequence, SortKey};

/// Which whitespace-separated column holds the measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    /// The final column of each record.
    #[default]
    Last,
    /// Zero-based column index.
    Index(usize),
}

impl Field {
    fn select<'l>(&self, columns: &[&'l str]) -> Option<&'l str> {
        match self {
            Field::Last => columns.last().copied(),
            Field::Index(i) => columns.get(*i).copied(),
        }
    }
}

/// Parse one measurement per line from `reader`.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_reader<T: SortKey, R: BufRead>(reader: R, field: Field) -> SortResult<NumericSequence<T>> {
    let mut values = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| SortError::Io {
            path: format!("line {}", line_no),
            source: e,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let columns: Vec<&str> = trimmed.split_whitespace().collect();
        let raw = field.select(&columns).ok_or_else(|| {
            SortError::InvalidInput(format!(
                "line {}: no measurement column {:?} in {:?}",
                line_no, field, trimmed
            ))
        })?;
        let value: T = raw.parse().map_err(|_| {
            SortError::InvalidInput(format!(
                "line {}: {:?} is not a valid {} measurement",
                line_no,
                raw,
                T::CL_TYPE
            ))
        })?;
        if !value.is_orderable() {
            return Err(SortError::InvalidInput(format!(
                "line {}: {:?} cannot be ordered",
                line_no, raw
            )));
        }
        values.push(value);
    }

    Ok(NumericSequence::new(values))
}

/// Load a dataset from a text file.
pub fn load_file<T: SortKey>(path: &Path, field: Field) -> SortResult<NumericSequence<T>> {
    let file = File::open(path).map_err(|e| SortError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let sequence = parse_reader(BufReader::new(file), field)?;
    log_loaded(&sequence, &path.display().to_string());
    Ok(sequence)
}

/// `count` uniform samples in `[low, high)` from a seeded generator.
pub fn synthetic<T: SortKey>(count: usize, seed: u64, low: f64, high: f64) -> NumericSequence<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..count)
        .map(|_| T::from_sample(rng.gen_range(low..high)))
        .collect();
    let sequence = NumericSequence::new(values);
    log_loaded(&sequence, "synthetic");
    sequence
}

fn log_loaded<T: SortKey>(sequence: &NumericSequence<T>, source: &str) {
    match sequence.last() {
        Some(last) => info!(source, size = sequence.len(), %last, "dataset loaded"),
        None => info!(source, size = 0, "dataset loaded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
# station year month day time temperature
BARKSTON_HEATH 2013 01 01 0000 -1.5
BARKSTON_HEATH 2013 01 01 0100 -1.8

BARKSTON_HEATH 2013 01 01 0200 0.25
";

    #[test]
    fn test_parse_last_column() {
        let seq: NumericSequence<f32> = parse_reader(Cursor::new(SAMPLE), Field::Last).unwrap();
        assert_eq!(seq.as_slice(), &[-1.5, -1.8, 0.25]);
    }

    #[test]
    fn test_parse_indexed_column() {
        let seq: NumericSequence<u32> = parse_reader(Cursor::new(SAMPLE), Field::Index(1)).unwrap();
        assert_eq!(seq.as_slice(), &[2013, 2013, 2013]);
    }

    #[test]
    fn test_bad_value_reports_line() {
        let err = parse_reader::<i32, _>(Cursor::new(SAMPLE), Field::Last).unwrap_err();
        match err {
            SortError::InvalidInput(msg) => {
                assert!(msg.contains("line 2"), "{}", msg);
                assert!(msg.contains("int"), "{}", msg);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_column() {
        let err = parse_reader::<i32, _>(Cursor::new("1 2\n3\n"), Field::Index(1)).unwrap_err();
        assert!(matches!(err, SortError::InvalidInput(_)));
    }

    #[test]
    fn test_nan_rejected() {
        let err = parse_reader::<f32, _>(Cursor::new("a 1.0\nb NaN\n"), Field::Last).unwrap_err();
        assert!(matches!(err, SortError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_source_is_empty_sequence() {
        let seq: NumericSequence<i32> = parse_reader(Cursor::new("\n# nothing\n"), Field::Last).unwrap();
        assert!(seq.is_empty());
    }

    #[test]
    fn test_synthetic_is_reproducible() {
        let a: NumericSequence<f32> = synthetic(100, 7, -10.0, 35.0);
        let b: NumericSequence<f32> = synthetic(100, 7, -10.0, 35.0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 100);
        assert!(a.as_slice().iter().all(|v| (-10.0..=35.0).contains(v)));
    }

    #[test]
    fn test_load_file_and_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("temps.txt");
        std::fs::write(&path, SAMPLE).unwrap();
        let seq: NumericSequence<f32> = load_file(&path, Field::Last).unwrap();
        assert_eq!(seq.len(), 3);

        let err = load_file::<f32>(&dir.path().join("missing.txt"), Field::Last).unwrap_err();
        assert!(matches!(err, SortError::Io { .. }));
    }
}
