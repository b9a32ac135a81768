//! Kernel trait definition

use crate::core::{Result, SparseVector};

/// Kernel function trait
///
/// A kernel function K(x, y) must satisfy Mercer's condition to be valid for SVM.
/// Solvers hold their own copy of the kernel, so implementations are cheap to clone.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64;

    /// True when K(x, y) is exactly the plain dot product
    ///
    /// Solvers use this to keep an explicit weight vector instead of support vectors.
    fn is_linear(&self) -> bool {
        false
    }

    /// Check the kernel parameters before training starts
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Short human-readable description
    fn describe(&self) -> String;
}
