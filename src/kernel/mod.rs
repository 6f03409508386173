//! Kernel functions for SVM training

pub mod coulomb;
pub mod gaussian;
pub mod linear;
pub mod polynomial;
pub mod tanh;
pub mod traits;

pub use self::coulomb::*;
pub use self::gaussian::*;
pub use self::linear::*;
pub use self::polynomial::*;
pub use self::tanh::*;
pub use self::traits::*;

use crate::core::{Result, SmoError};
use std::fmt;
use std::sync::Arc;

/// Kernel selection: one of the built-in kernels or a user-supplied one
#[derive(Clone)]
pub enum Kernel {
    Linear,
    Gaussian,
    Polynomial,
    Tanh,
    Coulomb,
    Custom(Arc<dyn KernelFn>),
}

impl Kernel {
    /// Wrap a user-defined kernel
    pub fn custom<K: KernelFn + 'static>(kernel: K) -> Self {
        Kernel::Custom(Arc::new(kernel))
    }

    /// Compute K(x, y; aux)
    pub fn compute(&self, x: &[f64], y: &[f64], aux: f64) -> f64 {
        match self {
            Kernel::Linear => LinearKernel.compute(x, y, aux),
            Kernel::Gaussian => GaussianKernel.compute(x, y, aux),
            Kernel::Polynomial => PolynomialKernel.compute(x, y, aux),
            Kernel::Tanh => TanhKernel.compute(x, y, aux),
            Kernel::Coulomb => CoulombKernel.compute(x, y, aux),
            Kernel::Custom(k) => k.compute(x, y, aux),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Kernel::Linear => LinearKernel.name(),
            Kernel::Gaussian => GaussianKernel.name(),
            Kernel::Polynomial => PolynomialKernel.name(),
            Kernel::Tanh => TanhKernel.name(),
            Kernel::Coulomb => CoulombKernel.name(),
            Kernel::Custom(k) => k.name(),
        }
    }

    /// Input dimensionality the kernel insists on, if any
    pub fn required_dim(&self) -> Option<usize> {
        match self {
            Kernel::Custom(k) => k.required_dim(),
            _ => None,
        }
    }

    /// Whether a model using this kernel can be written to disk
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Kernel::Custom(_))
    }

    /// Look up a built-in kernel by name
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Ok(Kernel::Linear),
            "gaussian" | "rbf" => Ok(Kernel::Gaussian),
            "polynomial" | "poly" => Ok(Kernel::Polynomial),
            "tanh" | "sigmoid" => Ok(Kernel::Tanh),
            "coulomb" => Ok(Kernel::Coulomb),
            other => Err(SmoError::UnsupportedKernel(other.to_string())),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Linear
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::Custom(k) => write!(f, "Custom({})", k.name()),
            _ => f.write_str(self.name()),
        }
    }
}
