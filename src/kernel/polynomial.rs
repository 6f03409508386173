//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (<x, y> + 1)^d
//!
//! where the degree d is the auxiliary parameter. Non-integer degrees are
//! accepted; a negative base is clamped to zero for those so the kernel
//! stays real-valued.

use crate::kernel::linear::dot;
use crate::kernel::KernelFn;

/// Inhomogeneous polynomial kernel of degree `aux`
#[derive(Debug, Clone, Copy, Default)]
pub struct PolynomialKernel;

impl PolynomialKernel {
    pub fn new() -> Self {
        Self
    }
}

impl KernelFn for PolynomialKernel {
    fn compute(&self, x: &[f64], y: &[f64], aux: f64) -> f64 {
        let base = dot(x, y) + 1.0;
        if aux.fract() == 0.0 && aux.abs() <= i32::MAX as f64 {
            base.powi(aux as i32)
        } else if base < 0.0 {
            0.0
        } else {
            base.powf(aux)
        }
    }

    fn name(&self) -> &str {
        "polynomial"
    }
}
