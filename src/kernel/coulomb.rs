//! Coulomb kernel implementation
//!
//! K(x, y) = (1 + ||x - y||² / aux)^(-d/2)
//!
//! where d is the input dimensionality. Decays polynomially instead of
//! exponentially, so distant exemplars keep some influence.

use crate::kernel::gaussian::squared_distance;
use crate::kernel::KernelFn;

/// Coulomb-style potential kernel with scale `aux`
#[derive(Debug, Clone, Copy, Default)]
pub struct CoulombKernel;

impl CoulombKernel {
    pub fn new() -> Self {
        Self
    }
}

impl KernelFn for CoulombKernel {
    fn compute(&self, x: &[f64], y: &[f64], aux: f64) -> f64 {
        let dist_sq = squared_distance(x, y);
        if aux <= 0.0 {
            return if dist_sq == 0.0 { 1.0 } else { 0.0 };
        }
        let exponent = -(x.len() as f64) / 2.0;
        (1.0 + dist_sq / aux).powf(exponent)
    }

    fn name(&self) -> &str {
        "coulomb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_coulomb_identical() {
        let kernel = CoulombKernel::new();
        assert_relative_eq!(kernel.compute(&[2.0, 3.0], &[2.0, 3.0], 1.0), 1.0);
    }

    #[test]
    fn test_coulomb_known_value() {
        let kernel = CoulombKernel::new();
        // d = 2, ||x - y||² = 2, aux = 2: (1 + 1)^(-1) = 0.5
        let result = kernel.compute(&[1.0, 1.0], &[0.0, 0.0], 2.0);
        assert_relative_eq!(result, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_coulomb_monotone_in_distance() {
        let kernel = CoulombKernel::new();
        let near = kernel.compute(&[0.0], &[0.5], 1.0);
        let far = kernel.compute(&[0.0], &[3.0], 1.0);
        assert!(near > far);
    }
}
