//! CSV format reader
//!
//! Every row holds the input features followed by the targets; the last
//! `target_columns` fields are targets. A leading header row is detected
//! automatically unless disabled.

use crate::core::{Dataset, Result, SmoError};
use crate::data::DenseDataset;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// How to split and interpret CSV rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Number of trailing columns that hold targets
    pub target_columns: usize,
    /// Skip the first row if it does not look numeric
    pub detect_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            target_columns: 1,
            detect_header: true,
        }
    }
}

impl DenseDataset {
    /// Load a CSV file whose last column is the target
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_csv_file_with_options(path, CsvOptions::default())
    }

    pub fn from_csv_file_with_options<P: AsRef<Path>>(path: P, options: CsvOptions) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_csv_reader(BufReader::new(file), options)
    }

    /// Load a CSV dataset from any buffered reader
    pub fn from_csv_reader<R: BufRead>(reader: R, options: CsvOptions) -> Result<Self> {
        if options.target_columns == 0 {
            return Err(SmoError::InvalidParameter(
                "at least one target column is required".to_string(),
            ));
        }

        let mut dataset = DenseDataset::default();
        let mut first_row = true;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if first_row {
                first_row = false;
                if options.detect_header && is_header_line(line) {
                    continue;
                }
            }

            let (x, y) = parse_data_line(line, options.target_columns).map_err(|e| {
                SmoError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            dataset.push(x, y)?;
        }

        if dataset.is_empty() {
            return Err(SmoError::EmptyDataset);
        }
        Ok(dataset)
    }
}

/// A row is a header when most of its fields are not numbers
fn is_header_line(line: &str) -> bool {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 2 {
        return false;
    }
    let non_numeric = fields
        .iter()
        .filter(|field| field.trim().parse::<f64>().is_err())
        .count();
    non_numeric * 2 > fields.len()
}

fn parse_data_line(line: &str, target_columns: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();

    if fields.len() <= target_columns {
        return Err(SmoError::ParseError(format!(
            "expected more than {} fields, found {}",
            target_columns,
            fields.len()
        )));
    }

    let mut values = Vec::with_capacity(fields.len());
    for (idx, field) in fields.iter().enumerate() {
        let value = field.parse::<f64>().map_err(|_| {
            SmoError::ParseError(format!("Invalid value at column {}: {}", idx + 1, field))
        })?;
        values.push(value);
    }

    let targets = values.split_off(fields.len() - target_columns);
    Ok((values, targets))
}
