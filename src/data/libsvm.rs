//! LibSVM format reader
//!
//! Each line holds a target followed by sparse `index:value` pairs:
//! `target index:value index:value ...`
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1
//!
//! Indices are 1-based. Missing features are zero; the input
//! dimensionality is the largest index seen in the file.

use crate::core::{Result, SmoError};
use crate::data::DenseDataset;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Largest accepted 1-based feature index. Rows are stored densely, so a
/// stray huge index would otherwise allocate that many columns per row.
pub const MAX_FEATURE_INDEX: usize = 1 << 24;

/// One parsed line: target and 0-based sparse features
type SparseRow = (f64, Vec<(usize, f64)>);

impl DenseDataset {
    /// Load a dataset from a LibSVM format file
    pub fn from_libsvm_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_libsvm_reader(BufReader::new(file))
    }

    /// Load a LibSVM dataset from any buffered reader. Targets are kept as
    /// written, so the same file can feed classification or regression.
    pub fn from_libsvm_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut rows = Vec::new();
        let mut dim = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let row = parse_line(line).map_err(|e| {
                SmoError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            if let Some(&(last, _)) = row.1.iter().max_by_key(|(idx, _)| *idx) {
                dim = dim.max(last + 1);
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(SmoError::EmptyDataset);
        }

        let mut dataset = DenseDataset::default();
        for (target, features) in rows {
            let mut x = vec![0.0; dim];
            for (idx, value) in features {
                x[idx] = value;
            }
            dataset.push(x, vec![target])?;
        }
        Ok(dataset)
    }
}

fn parse_line(line: &str) -> Result<SparseRow> {
    let mut parts = line.split_whitespace();

    let target_str = parts
        .next()
        .ok_or_else(|| SmoError::ParseError("Empty line".to_string()))?;
    let target = target_str
        .parse::<f64>()
        .map_err(|_| SmoError::ParseError(format!("Invalid target: {}", target_str)))?;

    let mut features = Vec::new();
    for feature_str in parts {
        let (index, value) = feature_str.split_once(':').ok_or_else(|| {
            SmoError::ParseError(format!("Invalid feature format: {}", feature_str))
        })?;

        let index = index
            .parse::<usize>()
            .map_err(|_| SmoError::ParseError(format!("Invalid feature index: {}", index)))?;
        let value = value
            .parse::<f64>()
            .map_err(|_| SmoError::ParseError(format!("Invalid feature value: {}", value)))?;

        if index == 0 {
            return Err(SmoError::ParseError(
                "Feature index must be positive: 0".to_string(),
            ));
        }
        if index > MAX_FEATURE_INDEX {
            return Err(SmoError::ParseError(format!(
                "Feature index {} exceeds limit {}",
                index, MAX_FEATURE_INDEX
            )));
        }
        features.push((index - 1, value));
    }

    Ok((target, features))
}
