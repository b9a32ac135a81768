//! Training configuration and cancellation

use crate::core::{Result, SVMError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 1000 times the smallest positive subnormal double
///
/// Multipliers within this fraction of 0 or C are snapped onto the bound.
pub const DEFAULT_SNAP_FRACTION: f64 = 4.940_656_458_412_465_4e-321;

/// Preprocessing applied to the features before training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Rescale each feature to [0, 1] over the training range
    #[default]
    Normalize,
    /// Zero mean, unit variance per feature
    Standardize,
    /// Use the features as given
    None,
}

/// Configuration shared by every pairwise solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SMOConfig {
    /// Complexity constant; the box constraint of example i is `c * weight_i`
    pub c: f64,
    /// KKT tolerance (violations below `2 * tol` are accepted)
    pub tol: f64,
    /// Round-off epsilon: minimum meaningful multiplier change and endpoint tie-break
    pub eps: f64,
    /// Fraction of the bound within which a multiplier is snapped to 0 or C
    pub snap_fraction: f64,
    /// Optional cap on outer optimisation passes; `None` runs to convergence
    pub max_passes: Option<usize>,
    /// Kernel cache capacity in entries (0 disables caching)
    pub cache_size: usize,
    /// Fit a probability calibrator per pair
    pub build_calibration: bool,
    /// Calibration folds; values below 2 calibrate on the training data itself
    pub num_folds: i32,
    /// Seed for subset shuffling and calibration folds
    pub seed: u64,
    /// Feature preprocessing
    pub filter: FilterType,
    /// Skip missing-value replacement and filtering; input must already be clean
    pub checks_turned_off: bool,
    /// Worker threads for pair training and batch prediction (0 = all cores)
    pub num_threads: usize,
}

impl Default for SMOConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            tol: 1.0e-3,
            eps: 1.0e-12,
            snap_fraction: DEFAULT_SNAP_FRACTION,
            max_passes: None,
            cache_size: 250_007,
            build_calibration: false,
            num_folds: -1,
            seed: 1,
            filter: FilterType::Normalize,
            checks_turned_off: false,
            num_threads: 1,
        }
    }
}

impl SMOConfig {
    /// Reject configurations that cannot produce a model
    pub fn validate(&self) -> Result<()> {
        if !self.c.is_finite() || self.c <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "C must be positive and finite, got {}",
                self.c
            )));
        }
        if !self.tol.is_finite() || self.tol <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "tolerance must be positive and finite, got {}",
                self.tol
            )));
        }
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "epsilon must be non-negative and finite, got {}",
                self.eps
            )));
        }
        if !self.snap_fraction.is_finite() || !(0.0..0.5).contains(&self.snap_fraction) {
            return Err(SVMError::InvalidParameter(format!(
                "snap fraction must lie in [0, 0.5), got {}",
                self.snap_fraction
            )));
        }
        if self.max_passes == Some(0) {
            return Err(SVMError::InvalidParameter(
                "max passes must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared flag polled by training loops; once set, training returns `SVMError::Cancelled`
///
/// A token made with [`child`](Self::child) is also cancelled by its parent,
/// but cancelling the child leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// New token that follows this one
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Request cancellation of every training that holds a clone of this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SVMError::Cancelled)
        } else {
            Ok(())
        }
    }
}
