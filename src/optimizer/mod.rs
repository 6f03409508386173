//! Training driver and the exported SVM model
//!
//! `SmoTrainer` owns a configuration plus the optional hooks, runs a
//! `TrainingSession` over a dataset and hands back an immutable `Svm`.

use crate::core::{
    CancelToken, Dataset, Mode, Model, Prediction, Result, SmoConfig, SmoError, SweepReport,
    TrainingSummary,
};
use crate::kernel::Kernel;
use crate::solver::{FinalHook, ProgressHook, TrainingSession};
use log::info;

/// Configures and runs one training session
pub struct SmoTrainer<'h> {
    config: SmoConfig,
    progress_hook: Option<ProgressHook<'h>>,
    final_hook: Option<FinalHook<'h>>,
    cancel: Option<CancelToken>,
}

impl<'h> SmoTrainer<'h> {
    /// Create a new trainer with the given configuration
    pub fn new(config: SmoConfig) -> Self {
        Self {
            config,
            progress_hook: None,
            final_hook: None,
            cancel: None,
        }
    }

    /// Called after every sweep
    pub fn with_progress_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&SweepReport) + 'h,
    {
        self.progress_hook = Some(Box::new(hook));
        self
    }

    /// Called once when training stops, whatever the reason
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

    /// Train on `dataset`. Non-convergence is reported through
    /// `TrainingSummary::status`; the model holds the best state reached.
    pub fn train<D: Dataset + ?Sized>(self, dataset: &D) -> Result<(Svm, TrainingSummary)> {
        let mut session = TrainingSession::new(dataset, self.config)?;
        if let Some(hook) = self.progress_hook {
            session.set_progress_hook(hook);
        }
        if let Some(hook) = self.final_hook {
            session.set_final_hook(hook);
        }
        if let Some(token) = self.cancel {
            session.set_cancel_token(token);
        }

        info!(
            "Training {:?} on {} exemplars with {} kernel",
            session.mode(),
            dataset.len(),
            session.config().kernel.name()
        );
        session.train();
        let summary = session.summary();
        Ok((session.to_model(), summary))
    }
}

/// One support vector of a trained model
#[derive(Debug, Clone, PartialEq)]
pub struct SupportVector {
    /// Lagrange multiplier: in `[0, C]` for classification, `[−C, C]` for
    /// regression
    pub alpha: f64,
    /// Training target
    pub y: f64,
    pub x: Vec<f64>,
}

impl SupportVector {
    /// Signed weight of this vector in the decision function
    pub fn coefficient(&self, mode: Mode) -> f64 {
        match mode {
            Mode::Classification => self.alpha * self.y,
            Mode::Regression => self.alpha,
        }
    }
}

/// Trained support vector machine
#[derive(Debug, Clone)]
pub struct Svm {
    x_dim: usize,
    bias: f64,
    kernel: Kernel,
    aux: f64,
    mode: Mode,
    support_vectors: Vec<SupportVector>,
}

impl Svm {
    pub fn new(
        x_dim: usize,
        bias: f64,
        kernel: Kernel,
        aux: f64,
        mode: Mode,
        support_vectors: Vec<SupportVector>,
    ) -> Result<Self> {
        if let Some(sv) = support_vectors.iter().find(|sv| sv.x.len() != x_dim) {
            return Err(SmoError::DimensionMismatch {
                expected: x_dim,
                actual: sv.x.len(),
            });
        }
        Ok(Self {
            x_dim,
            bias,
            kernel,
            aux,
            mode,
            support_vectors,
        })
    }

    /// Decision value f(x) = Σ coefficient_i · K(x_i, x) + b
    pub fn output(&self, x: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .map(|sv| sv.coefficient(self.mode) * self.kernel.compute(&sv.x, x, self.aux))
            .sum::<f64>()
            + self.bias
    }

    /// Like `predict`, but rejects inputs of the wrong dimensionality
    pub fn try_predict(&self, x: &[f64]) -> Result<Prediction> {
        if x.len() != self.x_dim {
            return Err(SmoError::DimensionMismatch {
                expected: self.x_dim,
                actual: x.len(),
            });
        }
        Ok(self.predict(x))
    }

    pub fn x_dim(&self) -> usize {
        self.x_dim
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn aux(&self) -> f64 {
        self.aux
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn support_vectors(&self) -> &[SupportVector] {
        &self.support_vectors
    }
}

impl Model for Svm {
    fn predict(&self, x: &[f64]) -> Prediction {
        let decision_value = self.output(x);
        let label = match self.mode {
            Mode::Classification if decision_value >= 0.0 => 1.0,
            Mode::Classification => -1.0,
            Mode::Regression => decision_value,
        };
        Prediction::new(label, decision_value)
    }

    fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    fn bias(&self) -> f64 {
        self.bias
    }
}

impl<'a, D: Dataset + ?Sized> TrainingSession<'a, D> {
    /// Export the current multipliers as a model. Support vectors appear in
    /// training-set order. Does not change the session.
    pub fn to_model(&self) -> Svm {
        let data = self.data();
        let support_vectors = self
            .support_indices()
            .into_iter()
            .map(|i| SupportVector {
                alpha: self.alpha(i),
                y: self.target(i),
                x: data.x(i).to_vec(),
            })
            .collect();
        Svm {
            x_dim: data.x_dim(),
            bias: self.bias(),
            kernel: self.config().kernel.clone(),
            aux: self.config().aux,
            mode: self.mode(),
            support_vectors,
        }
    }
}
