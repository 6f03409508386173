//! Gaussian kernel implementation
//!
//! K(x, y) = exp(-||x - y||² / (2σ²)) with σ given by the auxiliary parameter.

use crate::kernel::KernelFn;

/// Gaussian (RBF) kernel with width `aux`
///
/// Large widths make every exemplar influence a wide neighbourhood;
/// small widths make the decision surface local.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianKernel;

impl GaussianKernel {
    pub fn new() -> Self {
        Self
    }
}

impl KernelFn for GaussianKernel {
    fn compute(&self, x: &[f64], y: &[f64], aux: f64) -> f64 {
        let sigma_sq = aux * aux;
        if sigma_sq <= 0.0 {
            return if squared_distance(x, y) == 0.0 { 1.0 } else { 0.0 };
        }
        (-0.5 * squared_distance(x, y) / sigma_sq).exp()
    }

    fn name(&self) -> &str {
        "gaussian"
    }
}

/// Squared Euclidean distance ||x - y||²
pub fn squared_distance(x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(a, b)| {
            let d = a - b;
            d * d
        })
        .sum()
}
