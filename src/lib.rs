//! Pairwise support vector classification
//!
//! One-vs-one multiclass SVM built from binary solvers trained with Platt's
//! Sequential Minimal Optimization, using the two-threshold improvements of
//! Keerthi et al. ("Improvements to Platt's SMO Algorithm for SVM Classifier
//! Design"). Pairwise outputs are combined by voting or, when calibrated, by
//! the pairwise coupling of Hastie and Tibshirani.

pub mod api;
pub mod cache;
pub mod calibration;
pub mod core;
pub mod data;
pub mod filter;
pub mod kernel;
pub mod multiclass;
pub mod persistence;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::{EvaluationMetrics, SMO};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::calibration::{Calibrator, LogisticCalibrator};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{CancellationToken, FilterType, Result, SMOConfig, SVMError};
pub use crate::data::LibSVMReader;
pub use crate::filter::Preprocessor;
pub use crate::kernel::{Kernel, KernelType, LinearKernel, PolynomialKernel, RBFKernel};
pub use crate::multiclass::{pairwise_coupling, MulticlassSMO};
pub use crate::solver::BinarySMO;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
