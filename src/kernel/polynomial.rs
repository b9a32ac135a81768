//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! With d = 1, γ = 1 and r = 0 it reduces to the plain dot product and is
//! reported as linear, which lets the solver keep an explicit weight vector.

use crate::core::{Result, SVMError, SparseVector};
use crate::kernel::traits::Kernel;
use serde::{Deserialize, Serialize};

/// Polynomial kernel with configurable degree, gamma, and coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialKernel {
    /// Scaling factor for the dot product
    pub gamma: f64,
    /// Independent term in the polynomial
    pub coef0: f64,
    /// Degree of the polynomial
    pub degree: u32,
}

impl PolynomialKernel {
    /// Creates a new polynomial kernel with the specified parameters
    ///
    /// # Examples
    /// ```
    /// use pairsvm::kernel::PolynomialKernel;
    ///
    /// // Quadratic kernel with lower-order terms: (x·y + 1)²
    /// let quad = PolynomialKernel::new(2, 1.0, 1.0);
    /// assert_eq!(quad.degree, 2);
    /// ```
    pub fn new(degree: u32, gamma: f64, coef0: f64) -> Self {
        assert!(degree > 0, "Polynomial degree must be positive");
        assert!(gamma > 0.0, "Gamma must be positive");

        Self {
            gamma,
            coef0,
            degree,
        }
    }

    /// Plain power of the dot product: <x, y>^d
    pub fn homogeneous(degree: u32) -> Self {
        Self::new(degree, 1.0, 0.0)
    }

    /// Quadratic kernel with lower-order terms: (γ * <x,y> + 1)²
    pub fn quadratic(gamma: f64) -> Self {
        Self::new(2, gamma, 1.0)
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        let base = self.gamma * x.dot(y) + self.coef0;
        if self.degree == 1 {
            base
        } else {
            base.powi(self.degree as i32)
        }
    }

    fn is_linear(&self) -> bool {
        self.degree == 1 && self.gamma == 1.0 && self.coef0 == 0.0
    }

    fn validate(&self) -> Result<()> {
        if self.degree == 0 || !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "polynomial kernel needs degree > 0 and gamma > 0, got degree {} gamma {}",
                self.degree, self.gamma
            )));
        }
        if !self.coef0.is_finite() {
            return Err(SVMError::InvalidParameter(
                "polynomial kernel coef0 must be finite".to_string(),
            ));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "polynomial (degree {}, gamma {}, coef0 {})",
            self.degree, self.gamma, self.coef0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polynomial_kernel_computation() {
        let kernel = PolynomialKernel::new(2, 1.0, 1.0);

        let x = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);
        let y = SparseVector::new(vec![0, 1], vec![2.0, 1.0]);

        // (1 * 4 + 1)² = 25
        assert_relative_eq!(kernel.compute(&x, &y), 25.0, epsilon = 1e-10);
    }

    #[test]
    fn test_polynomial_kernel_same_vector() {
        let kernel = PolynomialKernel::new(3, 0.5, 2.0);
        let x = SparseVector::new(vec![0, 1], vec![3.0, 4.0]);

        // (0.5 * 25 + 2)³ = 14.5³
        assert_relative_eq!(kernel.compute(&x, &x), 3048.625, epsilon = 1e-6);
    }

    #[test]
    fn test_odd_degree_keeps_sign() {
        let kernel = PolynomialKernel::homogeneous(3);
        let x = SparseVector::new(vec![0], vec![1.0]);
        let y = SparseVector::new(vec![0], vec![-2.0]);

        assert_relative_eq!(kernel.compute(&x, &y), -8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_detection() {
        assert!(PolynomialKernel::homogeneous(1).is_linear());
        assert!(!PolynomialKernel::new(1, 1.0, 1.0).is_linear());
        assert!(!PolynomialKernel::new(1, 2.0, 0.0).is_linear());
        assert!(!PolynomialKernel::homogeneous(2).is_linear());
    }

    #[test]
    fn test_validate_rejects_hand_built_kernel() {
        let kernel = PolynomialKernel {
            gamma: -1.0,
            coef0: 0.5,
            degree: 2,
        };
        assert!(kernel.validate().is_err());
        assert!(PolynomialKernel::quadratic(0.5).validate().is_ok());
    }

    #[test]
    #[should_panic(expected = "Polynomial degree must be positive")]
    fn test_invalid_degree() {
        PolynomialKernel::new(0, 1.0, 1.0);
    }
}
