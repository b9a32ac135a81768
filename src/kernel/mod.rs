//! Kernel functions for SVM

pub mod evaluator;
pub mod linear;
pub mod polynomial;
pub mod rbf;
pub mod traits;

pub use self::evaluator::*;
pub use self::linear::*;
pub use self::polynomial::*;
pub use self::rbf::*;
pub use self::traits::*;

use crate::core::{Result, SparseVector};
use serde::{Deserialize, Serialize};

/// Closed set of the built-in kernels, for configuration and saved models
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KernelType {
    #[default]
    Linear,
    Polynomial(PolynomialKernel),
    Rbf(RBFKernel),
}

impl Kernel for KernelType {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        match self {
            KernelType::Linear => LinearKernel.compute(x, y),
            KernelType::Polynomial(k) => k.compute(x, y),
            KernelType::Rbf(k) => k.compute(x, y),
        }
    }

    fn is_linear(&self) -> bool {
        match self {
            KernelType::Linear => LinearKernel.is_linear(),
            KernelType::Polynomial(k) => k.is_linear(),
            KernelType::Rbf(k) => k.is_linear(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            KernelType::Linear => LinearKernel.validate(),
            KernelType::Polynomial(k) => k.validate(),
            KernelType::Rbf(k) => k.validate(),
        }
    }

    fn describe(&self) -> String {
        match self {
            KernelType::Linear => LinearKernel.describe(),
            KernelType::Polynomial(k) => k.describe(),
            KernelType::Rbf(k) => k.describe(),
        }
    }
}

impl From<LinearKernel> for KernelType {
    fn from(_: LinearKernel) -> Self {
        KernelType::Linear
    }
}

impl From<PolynomialKernel> for KernelType {
    fn from(kernel: PolynomialKernel) -> Self {
        KernelType::Polynomial(kernel)
    }
}

impl From<RBFKernel> for KernelType {
    fn from(kernel: RBFKernel) -> Self {
        KernelType::Rbf(kernel)
    }
}
