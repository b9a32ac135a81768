//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) controls the kernel width.

use crate::core::{Result, SVMError, SparseVector};
use crate::kernel::Kernel;
use serde::{Deserialize, Serialize};

/// RBF kernel: K(x, y) = exp(-γ * ||x - y||²)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with specified gamma parameter
    ///
    /// # Panics
    /// Panics if gamma is not positive
    pub fn new(gamma: f64) -> Self {
        assert!(gamma > 0.0, "Gamma must be positive, got: {}", gamma);
        Self { gamma }
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Default for RBFKernel {
    /// Gamma 0.01, suited to features normalised into [0, 1]
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        (-self.gamma * squared_distance(x, y)).exp()
    }

    fn validate(&self) -> Result<()> {
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "RBF gamma must be positive, got {}",
                self.gamma
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("rbf (gamma {})", self.gamma)
    }
}

/// Squared Euclidean distance of two sparse vectors by a merge walk
///
/// Indices present in only one vector contribute the square of that value.
fn squared_distance(x: &SparseVector, y: &SparseVector) -> f64 {
    let mut distance_sq = 0.0;
    let mut i = 0;
    let mut j = 0;

    while i < x.indices.len() && j < y.indices.len() {
        let x_idx = x.indices[i];
        let y_idx = y.indices[j];

        if x_idx == y_idx {
            let diff = x.values[i] - y.values[j];
            distance_sq += diff * diff;
            i += 1;
            j += 1;
        } else if x_idx < y_idx {
            distance_sq += x.values[i] * x.values[i];
            i += 1;
        } else {
            distance_sq += y.values[j] * y.values[j];
            j += 1;
        }
    }

    distance_sq += x.values[i..].iter().map(|v| v * v).sum::<f64>();
    distance_sq += y.values[j..].iter().map(|v| v * v).sum::<f64>();

    distance_sq
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rbf_kernel_identical_vectors() {
        let kernel = RBFKernel::new(0.5);
        let x = SparseVector::new(vec![0, 3], vec![1.0, -2.0]);

        assert_relative_eq!(kernel.compute(&x, &x), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rbf_kernel_known_value() {
        let kernel = RBFKernel::new(0.5);
        let x = SparseVector::new(vec![0], vec![1.0]);
        let y = SparseVector::new(vec![1], vec![1.0]);

        // ||x - y||² = 2, exp(-0.5 * 2)
        assert_relative_eq!(kernel.compute(&x, &y), (-1.0f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_squared_distance_tails() {
        let x = SparseVector::new(vec![0, 1, 5], vec![1.0, 2.0, 3.0]);
        let y = SparseVector::new(vec![1], vec![1.0]);

        // 1 + (2-1)² + 9
        assert_eq!(squared_distance(&x, &y), 11.0);
        assert_eq!(squared_distance(&y, &x), 11.0);
        assert_eq!(squared_distance(&SparseVector::empty(), &y), 1.0);
    }

    #[test]
    fn test_rbf_kernel_symmetry() {
        let kernel = RBFKernel::default();
        let x = SparseVector::new(vec![0, 2], vec![1.0, 4.0]);
        let y = SparseVector::new(vec![1, 2], vec![3.0, 1.0]);

        assert_eq!(kernel.compute(&x, &y), kernel.compute(&y, &x));
        assert!(!kernel.is_linear());
    }

    #[test]
    #[should_panic(expected = "Gamma must be positive")]
    fn test_rbf_kernel_invalid_gamma() {
        RBFKernel::new(0.0);
    }
}
