//! Sequential Minimal Optimization
//!
//! `smo` holds the training session: pair selection, the analytic pair
//! step and the sweep loop. The remaining modules are the bookkeeping it
//! is built from.

pub mod decomposition;
pub mod evaluator;
pub mod membership;
pub mod output;
pub mod smo;

pub use self::evaluator::CachedKernel;
pub use self::membership::MembershipList;
pub use self::output::{OutputStats, OutputTracker};
pub use self::smo::{FinalHook, ProgressHook, StepPlan, TrainingSession};
