//! Core type definitions for the SMO trainer

use crate::cache::CacheStats;
use crate::kernel::Kernel;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Prediction result containing label and decision value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted class label (+1 or -1), or the regression estimate
    pub label: f64,
    /// Raw decision function value
    pub decision_value: f64,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: f64, decision_value: f64) -> Self {
        Self {
            label,
            decision_value,
        }
    }

    /// Get confidence as absolute value of decision value
    pub fn confidence(&self) -> f64 {
        self.decision_value.abs()
    }
}

/// Learning task solved by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Binary classification with targets in {-1, +1}
    Classification,
    /// Epsilon-insensitive regression
    Regression,
}

/// Heuristic toggles for the working-set selector and output tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heuristics {
    /// Reconstruct stale outputs from the recent step history when cheaper
    /// than a full resummation
    pub ultra_clever: bool,
    /// Pick the partner that yields the largest objective decrease instead
    /// of the one with the most opposite error
    pub best_step: bool,
    /// Examine the worst KKT violators first in every sweep
    pub worst_first: bool,
    /// Leave the whole-set fallback scan to examine-all sweeps
    pub lazy_loop: bool,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            ultra_clever: true,
            best_step: false,
            worst_first: false,
            lazy_loop: false,
        }
    }
}

/// Configuration consumed when a training session is constructed
#[derive(Debug, Clone)]
pub struct SmoConfig {
    /// Kernel function
    pub kernel: Kernel,
    /// Auxiliary kernel parameter
    pub aux: f64,
    /// Box constraint (upper bound for |alpha|)
    pub c: f64,
    /// Tolerance for KKT conditions
    pub tol: f64,
    /// Numerical noise floor for step acceptance
    pub eps: f64,
    /// Kernel cache capacity in exemplar slots
    pub cache_size: usize,
    /// Which target component of the dataset to train on
    pub target_index: usize,
    /// Solve epsilon-insensitive regression instead of classification
    pub regression: bool,
    /// Width of the insensitive tube for regression
    pub regeps: f64,
    /// Active subset size when the problem is decomposed.
    /// Defaults to the cache capacity.
    pub subset_size: Option<usize>,
    /// Heuristic toggles
    pub heuristics: Heuristics,
    /// Maximum number of examined candidates.
    /// Defaults to `max(N², 10_000)`.
    pub max_iterations: Option<usize>,
    /// Seed for randomized scan ordering
    pub seed: u64,
}

impl SmoConfig {
    pub fn mode(&self) -> Mode {
        if self.regression {
            Mode::Regression
        } else {
            Mode::Classification
        }
    }
}

impl Default for SmoConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::Linear,
            aux: 1.0,
            c: 1.0,
            tol: 1e-3,
            eps: 1e-10,
            cache_size: 1000,
            target_index: 0,
            regression: false,
            regeps: 0.1,
            subset_size: None,
            heuristics: Heuristics::default(),
            max_iterations: None,
            seed: 0,
        }
    }
}

/// Shared flag checked once per sweep to stop a running session
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a training run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingStatus {
    /// Not started yet
    Initialized,
    /// Every exemplar satisfies its KKT condition within `tol`
    Converged,
    /// Iteration cap reached; multipliers hold the best state so far
    MaxIterations,
    /// Stopped through a `CancelToken`
    Cancelled,
    /// KKT violators remain but no further step is accepted, usually
    /// because `eps` rejects the remaining moves as negligible
    Stalled,
}

/// Snapshot handed to the progress hook after every sweep
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Sweep counter
    pub epoch: usize,
    /// Whether the sweep examined every active exemplar
    pub examine_all: bool,
    /// Steps accepted during this sweep
    pub num_changed: usize,
    /// Steps accepted since the session started
    pub steps: usize,
    /// Candidates examined since the session started
    pub iterations: usize,
    /// Dual objective (minimization form)
    pub objective: f64,
    /// Size of the non-zero set
    pub n_nonzero: usize,
    /// Size of the non-bound set
    pub n_nonbound: usize,
    /// Kernel cache counters
    pub cache: CacheStats,
}

/// Summary handed to the final hook
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub status: TrainingStatus,
    pub epochs: usize,
    pub steps: usize,
    pub iterations: usize,
    pub objective: f64,
    pub bias: f64,
    pub n_support_vectors: usize,
    /// Decomposition rounds; zero when the problem fit the cache
    pub rounds: usize,
    pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction() {
        let pred = Prediction::new(1.0, 2.5);
        assert_eq!(pred.label, 1.0);
        assert_eq!(pred.decision_value, 2.5);
        assert_eq!(pred.confidence(), 2.5);

        let neg_pred = Prediction::new(-1.0, -1.8);
        assert_eq!(neg_pred.confidence(), 1.8);
    }

    #[test]
    fn test_smo_config_default() {
        let config = SmoConfig::default();
        assert_eq!(config.c, 1.0);
        assert_eq!(config.tol, 1e-3);
        assert_eq!(config.cache_size, 1000);
        assert_eq!(config.mode(), Mode::Classification);
        assert!(config.subset_size.is_none());
        assert!(config.max_iterations.is_none());
    }

    #[test]
    fn test_heuristics_default() {
        let h = Heuristics::default();
        assert!(h.ultra_clever);
        assert!(!h.best_step);
        assert!(!h.worst_first);
        assert!(!h.lazy_loop);
    }

    #[test]
    fn test_config_mode() {
        let config = SmoConfig {
            regression: true,
            ..SmoConfig::default()
        };
        assert_eq!(config.mode(), Mode::Regression);
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
