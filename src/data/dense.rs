//! In-memory dense dataset

use crate::core::{Dataset, Result, SmoError};

/// Row-major dense storage of inputs and target vectors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DenseDataset {
    x: Vec<Vec<f64>>,
    y: Vec<Vec<f64>>,
    x_dim: usize,
    y_dim: usize,
}

impl DenseDataset {
    /// Build a dataset with a vector of targets per exemplar.
    ///
    /// All input rows must share one length, as must all target rows.
    pub fn new(x: Vec<Vec<f64>>, y: Vec<Vec<f64>>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SmoError::InvalidDataset(format!(
                "{} input rows but {} target rows",
                x.len(),
                y.len()
            )));
        }
        let x_dim = x.first().map_or(0, Vec::len);
        let y_dim = y.first().map_or(0, Vec::len);

        for row in &x {
            if row.len() != x_dim {
                return Err(SmoError::DimensionMismatch {
                    expected: x_dim,
                    actual: row.len(),
                });
            }
        }
        for row in &y {
            if row.len() != y_dim {
                return Err(SmoError::DimensionMismatch {
                    expected: y_dim,
                    actual: row.len(),
                });
            }
        }
        if !x.is_empty() && y_dim == 0 {
            return Err(SmoError::InvalidDataset(
                "exemplars need at least one target".to_string(),
            ));
        }

        Ok(Self { x, y, x_dim, y_dim })
    }

    /// Build a dataset with one scalar target per exemplar
    pub fn from_rows(x: Vec<Vec<f64>>, y: Vec<f64>) -> Result<Self> {
        Self::new(x, y.into_iter().map(|v| vec![v]).collect())
    }

    /// Append an exemplar
    pub fn push(&mut self, x: Vec<f64>, y: Vec<f64>) -> Result<()> {
        if self.x.is_empty() {
            self.x_dim = x.len();
            self.y_dim = y.len();
        } else if x.len() != self.x_dim {
            return Err(SmoError::DimensionMismatch {
                expected: self.x_dim,
                actual: x.len(),
            });
        } else if y.len() != self.y_dim {
            return Err(SmoError::DimensionMismatch {
                expected: self.y_dim,
                actual: y.len(),
            });
        }
        self.x.push(x);
        self.y.push(y);
        Ok(())
    }

    /// Zero-pad every input row to `dim` features. Sparse files only name
    /// the features they use, so a test file may come out narrower than
    /// the training file.
    pub fn padded_to(mut self, dim: usize) -> Result<Self> {
        if dim < self.x_dim {
            return Err(SmoError::DimensionMismatch {
                expected: dim,
                actual: self.x_dim,
            });
        }
        for row in &mut self.x {
            row.resize(dim, 0.0);
        }
        self.x_dim = dim;
        Ok(self)
    }

    /// Column `index` of the targets
    pub fn targets(&self, index: usize) -> Vec<f64> {
        self.y.iter().map(|row| row[index]).collect()
    }

    pub fn inputs(&self) -> &[Vec<f64>] {
        &self.x
    }
}

impl Dataset for DenseDataset {
    fn len(&self) -> usize {
        self.x.len()
    }

    fn x_dim(&self) -> usize {
        self.x_dim
    }

    fn y_dim(&self) -> usize {
        self.y_dim
    }

    fn x(&self, i: usize) -> &[f64] {
        &self.x[i]
    }

    fn y(&self, i: usize) -> &[f64] {
        &self.y[i]
    }
}
