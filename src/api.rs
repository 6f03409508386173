//! High-level API for training and using SMO models
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use smorch::api::Smorch;
//! use smorch::Kernel;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = Smorch::new()
//!     .with_kernel(Kernel::Gaussian)
//!     .with_aux(0.5)
//!     .with_c(10.0)
//!     .train_from_file("data.libsvm")?;
//!
//! let predictions = model.predict_from_file("test.libsvm")?;
//! println!("Accuracy: {:.2}%", model.evaluate_from_file("test.libsvm")? * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{
    CancelToken, Dataset, Heuristics, Mode, Model, Prediction, Result, SmoConfig, SmoError,
    SweepReport, TrainingStatus, TrainingSummary,
};
use crate::data::{CsvOptions, DenseDataset};
use crate::kernel::Kernel;
use crate::optimizer::{SmoTrainer, Svm};
use std::path::Path;

/// Builder for a training run
pub struct Smorch<'h> {
    config: SmoConfig,
    progress_hook: Option<Box<dyn FnMut(&SweepReport) + 'h>>,
    final_hook: Option<Box<dyn FnMut(&TrainingSummary) + 'h>>,
    cancel: Option<CancelToken>,
}

impl<'h> Smorch<'h> {
    /// Linear-kernel classifier with default parameters
    pub fn new() -> Self {
        Self::with_config(SmoConfig::default())
    }

    pub fn with_config(config: SmoConfig) -> Self {
        Self {
            config,
            progress_hook: None,
            final_hook: None,
            cancel: None,
        }
    }

    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.config.kernel = kernel;
        self
    }

    /// Auxiliary kernel parameter (Gaussian width, polynomial degree, ...)
    pub fn with_aux(mut self, aux: f64) -> Self {
        self.config.aux = aux;
        self
    }

    /// Set box constraint C
    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    /// Set KKT tolerance
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.config.tol = tol;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.config.eps = eps;
        self
    }

    /// Set kernel cache capacity in exemplars
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.config.cache_size = cache_size;
        self
    }

    /// Switch to epsilon-insensitive regression with tube width `regeps`
    pub fn with_regression(mut self, regeps: f64) -> Self {
        self.config.regression = true;
        self.config.regeps = regeps;
        self
    }

    pub fn with_target_index(mut self, index: usize) -> Self {
        self.config.target_index = index;
        self
    }

    pub fn with_subset_size(mut self, subset_size: usize) -> Self {
        self.config.subset_size = Some(subset_size);
        self
    }

    pub fn with_heuristics(mut self, heuristics: Heuristics) -> Self {
        self.config.heuristics = heuristics;
        self
    }

    /// Set maximum number of examined candidates
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_progress_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&SweepReport) + 'h,
    {
        self.progress_hook = Some(Box::new(hook));
        self
    }

    /// Called once with the summary when training stops
    pub fn with_final_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&TrainingSummary) + 'h,
    {
        self.final_hook = Some(Box::new(hook));
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &SmoConfig {
        &self.config
    }

    /// Train on a dataset
    pub fn train<D: Dataset + ?Sized>(self, dataset: &D) -> Result<TrainedModel> {
        let mut trainer = SmoTrainer::new(self.config.clone());
        if let Some(hook) = self.progress_hook {
            trainer = trainer.with_progress_hook(hook);
        }
        if let Some(hook) = self.final_hook {
            trainer = trainer.with_final_hook(hook);
        }
        if let Some(token) = self.cancel {
            trainer = trainer.with_cancel_token(token);
        }
        let (model, summary) = trainer.train(dataset)?;
        Ok(TrainedModel::new(model, self.config, Some(summary)))
    }

    /// Train from LibSVM format file
    pub fn train_from_file<P: AsRef<Path>>(self, path: P) -> Result<TrainedModel> {
        let dataset = DenseDataset::from_libsvm_file(path)?;
        self.train(&dataset)
    }

    /// Train from CSV file whose last column is the target
    pub fn train_from_csv<P: AsRef<Path>>(self, path: P) -> Result<TrainedModel> {
        let dataset = DenseDataset::from_csv_file(path)?;
        self.train(&dataset)
    }

    /// Train from CSV file with explicit column layout
    pub fn train_from_csv_with_options<P: AsRef<Path>>(
        self,
        path: P,
        options: CsvOptions,
    ) -> Result<TrainedModel> {
        let dataset = DenseDataset::from_csv_file_with_options(path, options)?;
        self.train(&dataset)
    }
}

impl Default for Smorch<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trained model together with the configuration that produced it
#[derive(Debug, Clone)]
pub struct TrainedModel {
    model: Svm,
    config: SmoConfig,
    summary: Option<TrainingSummary>,
}

impl TrainedModel {
    /// `summary` is absent for models loaded from disk
    pub fn new(model: Svm, config: SmoConfig, summary: Option<TrainingSummary>) -> Self {
        Self {
            model,
            config,
            summary,
        }
    }

    /// Predict a single input
    pub fn predict(&self, x: &[f64]) -> Prediction {
        self.model.predict(x)
    }

    /// Predict multiple inputs
    pub fn predict_batch(&self, xs: &[Vec<f64>]) -> Vec<Prediction> {
        self.model.predict_batch(xs)
    }

    /// Predict every exemplar of a dataset
    pub fn predict_dataset<D: Dataset + ?Sized>(&self, dataset: &D) -> Result<Vec<Prediction>> {
        (0..dataset.len())
            .map(|i| self.model.try_predict(dataset.x(i)))
            .collect()
    }

    /// Predict from LibSVM file
    pub fn predict_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Prediction>> {
        let dataset = self.load_libsvm(path)?;
        self.predict_dataset(&dataset)
    }

    /// Load a LibSVM file padded to the model's input width
    pub fn load_libsvm<P: AsRef<Path>>(&self, path: P) -> Result<DenseDataset> {
        DenseDataset::from_libsvm_file(path)?.padded_to(self.model.x_dim())
    }

    /// Predict from CSV file
    pub fn predict_from_csv<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Prediction>> {
        let dataset = DenseDataset::from_csv_file(path)?;
        self.predict_dataset(&dataset)
    }

    /// Accuracy for classifiers, mean squared error for regressors
    pub fn evaluate<D: Dataset + ?Sized>(&self, dataset: &D) -> Result<f64> {
        match self.model.mode() {
            Mode::Classification => Ok(self.evaluate_detailed(dataset)?.accuracy()),
            Mode::Regression => Ok(self.evaluate_regression(dataset)?.mse),
        }
    }

    /// Evaluate from LibSVM file
    pub fn evaluate_from_file<P: AsRef<Path>>(&self, path: P) -> Result<f64> {
        let dataset = self.load_libsvm(path)?;
        self.evaluate(&dataset)
    }

    /// Evaluate from CSV file
    pub fn evaluate_from_csv<P: AsRef<Path>>(&self, path: P) -> Result<f64> {
        let dataset = DenseDataset::from_csv_file(path)?;
        self.evaluate(&dataset)
    }

    /// Confusion counts against the configured target column
    pub fn evaluate_detailed<D: Dataset + ?Sized>(&self, dataset: &D) -> Result<EvaluationMetrics> {
        let predictions = self.predict_dataset(dataset)?;
        let targets = self.targets(dataset)?;

        let mut metrics = EvaluationMetrics::default();
        for (pred, &actual) in predictions.iter().zip(targets.iter()) {
            match (pred.label > 0.0, actual > 0.0) {
                (true, true) => metrics.true_positives += 1,
                (false, false) => metrics.true_negatives += 1,
                (true, false) => metrics.false_positives += 1,
                (false, true) => metrics.false_negatives += 1,
            }
        }
        Ok(metrics)
    }

    /// Error statistics against the configured target column
    pub fn evaluate_regression<D: Dataset + ?Sized>(
        &self,
        dataset: &D,
    ) -> Result<RegressionMetrics> {
        let predictions = self.predict_dataset(dataset)?;
        let targets = self.targets(dataset)?;
        Ok(RegressionMetrics::from_pairs(
            predictions
                .iter()
                .map(|p| p.decision_value)
                .zip(targets.iter().copied()),
        ))
    }

    fn targets<D: Dataset + ?Sized>(&self, dataset: &D) -> Result<Vec<f64>> {
        let index = self.config.target_index;
        if !dataset.is_empty() && index >= dataset.y_dim() {
            return Err(SmoError::InvalidParameter(format!(
                "target index {} out of range for {} target columns",
                index,
                dataset.y_dim()
            )));
        }
        Ok((0..dataset.len()).map(|i| dataset.y(i)[index]).collect())
    }

    /// Get model information
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            mode: self.model.mode(),
            kernel: self.model.kernel().name().to_string(),
            aux: self.model.aux(),
            x_dim: self.model.x_dim(),
            n_support_vectors: self.model.n_support_vectors(),
            n_bound_support_vectors: self
                .model
                .support_vectors()
                .iter()
                .filter(|sv| sv.alpha.abs() >= self.config.c)
                .count(),
            bias: self.model.bias(),
            status: self.summary.as_ref().map(|s| s.status),
        }
    }

    pub fn config(&self) -> &SmoConfig {
        &self.config
    }

    pub fn summary(&self) -> Option<&TrainingSummary> {
        self.summary.as_ref()
    }

    /// Get the underlying model
    pub fn inner(&self) -> &Svm {
        &self.model
    }
}

/// Confusion counts for a binary classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationMetrics {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvaluationMetrics {
    pub fn new(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        Self {
            true_positives: tp,
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    /// (TP + TN) / total
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    /// TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    /// TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * (p * r) / (p + r)
        }
    }

    /// TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        ratio(
            self.true_negatives,
            self.true_negatives + self.false_positives,
        )
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Error statistics for a regressor
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegressionMetrics {
    pub count: usize,
    /// Mean squared error
    pub mse: f64,
    /// Mean absolute error
    pub mae: f64,
    pub max_error: f64,
}

impl RegressionMetrics {
    /// Metrics over `(predicted, actual)` pairs
    pub fn from_pairs<I: IntoIterator<Item = (f64, f64)>>(pairs: I) -> Self {
        let mut metrics = Self::default();
        let (mut sq, mut abs) = (0.0, 0.0);
        for (predicted, actual) in pairs {
            let err = (predicted - actual).abs();
            sq += err * err;
            abs += err;
            metrics.max_error = metrics.max_error.max(err);
            metrics.count += 1;
        }
        if metrics.count > 0 {
            metrics.mse = sq / metrics.count as f64;
            metrics.mae = abs / metrics.count as f64;
        }
        metrics
    }

    pub fn rmse(&self) -> f64 {
        self.mse.sqrt()
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub mode: Mode,
    pub kernel: String,
    pub aux: f64,
    pub x_dim: usize,
    pub n_support_vectors: usize,
    /// Support vectors whose multiplier sits at the box constraint
    pub n_bound_support_vectors: usize,
    pub bias: f64,
    /// How training ended; unknown for loaded models
    pub status: Option<TrainingStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn line_data() -> DenseDataset {
        DenseDataset::from_rows(
            vec![vec![2.0], vec![-2.0], vec![1.5], vec![-1.5], vec![1.8], vec![-1.8]],
            vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_final_hook_sees_returned_summary() {
        let mut seen = None;
        let model = Smorch::new()
            .with_c(1.0)
            .with_final_hook(|summary| seen = Some(summary.clone()))
            .train(&line_data())
            .unwrap();
        let seen = seen.expect("final hook was not called");
        let summary = model.summary().unwrap();
        assert_eq!(seen.status, TrainingStatus::Converged);
        assert_eq!(seen.status, summary.status);
        assert_eq!(seen.steps, summary.steps);
        assert_eq!(seen.n_support_vectors, model.info().n_support_vectors);
    }

    #[test]
    fn test_builder_pattern() {
        let builder = Smorch::new()
            .with_c(2.0)
            .with_tolerance(0.01)
            .with_max_iterations(5000)
            .with_kernel(Kernel::Polynomial)
            .with_aux(3.0)
            .with_seed(9);

        assert_eq!(builder.config().c, 2.0);
        assert_eq!(builder.config().tol, 0.01);
        assert_eq!(builder.config().max_iterations, Some(5000));
        assert_eq!(builder.config().kernel.name(), "polynomial");
        assert_eq!(builder.config().aux, 3.0);
        assert_eq!(builder.config().seed, 9);
    }

    #[test]
    fn test_train_and_predict() {
        let model = Smorch::new().train(&line_data()).expect("Training should succeed");
        assert_eq!(model.predict(&[1.0]).label, 1.0);
        assert_eq!(model.predict(&[-1.0]).label, -1.0);

        let info = model.info();
        assert!(info.n_support_vectors > 0);
        assert_eq!(info.status, Some(TrainingStatus::Converged));
        assert_eq!(info.mode, Mode::Classification);
        assert_eq!(model.evaluate(&line_data()).unwrap(), 1.0);
    }

    #[test]
    fn test_evaluation_metrics() {
        let metrics = EvaluationMetrics::new(10, 5, 2, 3);

        assert_eq!(metrics.accuracy(), 0.75);
        assert_eq!(metrics.precision(), 10.0 / 12.0);
        assert_eq!(metrics.recall(), 10.0 / 13.0);
        assert!(metrics.f1_score() > 0.0);
        assert_eq!(metrics.specificity(), 5.0 / 7.0);
        assert_eq!(EvaluationMetrics::default().accuracy(), 0.0);
    }

    #[test]
    fn test_regression_metrics() {
        let metrics = RegressionMetrics::from_pairs(vec![(1.0, 2.0), (3.0, 3.0), (0.0, -2.0)]);
        assert_eq!(metrics.count, 3);
        assert_eq!(metrics.mse, 5.0 / 3.0);
        assert_eq!(metrics.mae, 1.0);
        assert_eq!(metrics.max_error, 2.0);
        assert_eq!(RegressionMetrics::from_pairs(Vec::new()).mse, 0.0);
    }

    #[test]
    fn test_regression_training() {
        let xs: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 / 3.0]).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 1.0 - x[0]).collect();
        let data = DenseDataset::from_rows(xs, ys).unwrap();

        let model = Smorch::new()
            .with_c(100.0)
            .with_regression(0.05)
            .train(&data)
            .unwrap();
        let metrics = model.evaluate_regression(&data).unwrap();
        assert!(metrics.max_error < 0.1, "{:?}", metrics);
        assert_eq!(model.evaluate(&data).unwrap(), metrics.mse);
    }

    #[test]
    fn test_dimension_mismatch_on_predict_dataset() {
        let model = Smorch::new().train(&line_data()).unwrap();
        let wide = DenseDataset::from_rows(vec![vec![1.0, 2.0]], vec![1.0]).unwrap();
        assert!(matches!(
            model.predict_dataset(&wide),
            Err(SmoError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_file_operations() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "+1 1:2.0").expect("Failed to write");
        writeln!(temp_file, "-1 1:-2.0").expect("Failed to write");
        writeln!(temp_file, "+1 1:1.5").expect("Failed to write");
        writeln!(temp_file, "-1 1:-1.5").expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let model = Smorch::new()
            .train_from_file(temp_file.path())
            .expect("Training should succeed");
        let accuracy = model
            .evaluate_from_file(temp_file.path())
            .expect("Evaluation should succeed");
        assert_eq!(accuracy, 1.0);
        assert_eq!(model.predict_from_file(temp_file.path()).unwrap().len(), 4);
    }

    #[test]
    fn test_csv_training() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "x,label").unwrap();
        for (x, y) in [(2.0, 1), (-2.0, -1), (1.0, 1), (-1.0, -1)] {
            writeln!(temp_file, "{},{}", x, y).unwrap();
        }
        temp_file.flush().unwrap();

        let model = Smorch::new().train_from_csv(temp_file.path()).unwrap();
        assert_eq!(model.evaluate_from_csv(temp_file.path()).unwrap(), 1.0);
    }

    #[test]
    fn test_progress_hook_through_builder() {
        let mut epochs = 0;
        let model = Smorch::new()
            .with_progress_hook(|r| epochs = r.epoch)
            .train(&line_data())
            .unwrap();
        assert!(epochs > 0);
        assert_eq!(Some(epochs), model.summary().map(|s| s.epochs));
    }
}
