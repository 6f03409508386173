//! Kernel trait definition

/// Kernel function capability
///
/// A kernel K(x, y; aux) must satisfy Mercer's condition for the dual
/// problem to stay convex. `aux` is the single auxiliary parameter every
/// kernel receives (width, degree, offset, ...). Both slices always have
/// the dataset's input dimensionality.
pub trait KernelFn: Send + Sync {
    /// Compute kernel value K(x, y; aux)
    fn compute(&self, x: &[f64], y: &[f64], aux: f64) -> f64;

    /// Stable identifier used in logs and persisted models
    fn name(&self) -> &str;

    /// Input dimensionality this kernel insists on, if any
    fn required_dim(&self) -> Option<usize> {
        None
    }
}
