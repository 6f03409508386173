//! Support vector machines trained by sequential minimal optimization
//!
//! Classification and ε-insensitive regression share one solver: a
//! piecewise-quadratic pair step over signed multipliers, a pairwise kernel
//! cache with LRU eviction, incrementally tracked outputs, and a
//! decomposition loop for problems larger than the cache.

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod optimizer;
pub mod persistence;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::{EvaluationMetrics, ModelInfo, RegressionMetrics, Smorch, TrainedModel};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{Result, SmoError};
pub use crate::data::{CsvOptions, DenseDataset};
pub use crate::kernel::{Kernel, KernelFn};
pub use crate::optimizer::{SmoTrainer, SupportVector, Svm};
pub use crate::solver::TrainingSession;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
