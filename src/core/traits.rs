//! Core traits for the SMO trainer

use crate::core::Prediction;

/// Indexed access to training exemplars.
///
/// Targets are vectors; the trainer picks one component through
/// `SmoConfig::target_index`.
pub trait Dataset {
    /// Number of exemplars
    fn len(&self) -> usize;

    /// Input dimensionality
    fn x_dim(&self) -> usize;

    /// Number of target components per exemplar
    fn y_dim(&self) -> usize;

    /// Input vector of exemplar `i`
    ///
    /// # Panics
    /// Panics if `i >= len()`
    fn x(&self, i: usize) -> &[f64];

    /// Target vector of exemplar `i`
    ///
    /// # Panics
    /// Panics if `i >= len()`
    fn y(&self, i: usize) -> &[f64];

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trained model interface
pub trait Model {
    /// Predict a single input vector
    fn predict(&self, x: &[f64]) -> Prediction;

    /// Predict many input vectors
    fn predict_batch(&self, xs: &[Vec<f64>]) -> Vec<Prediction> {
        xs.iter().map(|x| self.predict(x)).collect()
    }

    /// Get the number of support vectors
    fn n_support_vectors(&self) -> usize;

    /// Get the bias term
    fn bias(&self) -> f64;
}
