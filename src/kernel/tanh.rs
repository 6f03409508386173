//! Hyperbolic tangent kernel implementation
//!
//! K(x, y) = tanh(<x, y> - aux)
//!
//! Not positive semi-definite for every offset; the step solver copes with
//! the resulting non-positive curvature by evaluating both box endpoints.

use crate::kernel::linear::dot;
use crate::kernel::KernelFn;

/// Sigmoid-style kernel with offset `aux`
#[derive(Debug, Clone, Copy, Default)]
pub struct TanhKernel;

impl TanhKernel {
    pub fn new() -> Self {
        Self
    }
}

impl KernelFn for TanhKernel {
    fn compute(&self, x: &[f64], y: &[f64], aux: f64) -> f64 {
        (dot(x, y) - aux).tanh()
    }

    fn name(&self) -> &str {
        "tanh"
    }
}
