//! Linear kernel implementation

use crate::kernel::KernelFn;

/// Linear kernel: K(x, y) = x^T * y
///
/// The auxiliary parameter is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self
    }
}

impl KernelFn for LinearKernel {
    fn compute(&self, x: &[f64], y: &[f64], _aux: f64) -> f64 {
        dot(x, y)
    }

    fn name(&self) -> &str {
        "linear"
    }
}

/// Dot product of two dense vectors of equal length
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}
