//! Logistic calibration: `P(second class | s) = 1 / (1 + exp(-(slope * s + intercept)))`
//!
//! Fitted by Newton's method with backtracking on the weighted, ridge-penalised
//! negative log-likelihood.

use super::{CalibrationSet, Calibrator};
use crate::core::{Result, SVMError};
use serde::{Deserialize, Serialize};

const MIN_STEP: f64 = 1e-10;
const GRADIENT_TOLERANCE: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticCalibrator {
    pub slope: f64,
    pub intercept: f64,
    /// Penalty on both coefficients
    pub ridge: f64,
    pub max_iterations: usize,
}

impl Default for LogisticCalibrator {
    fn default() -> Self {
        Self {
            slope: 0.0,
            intercept: 0.0,
            ridge: 1e-8,
            max_iterations: 100,
        }
    }
}

impl LogisticCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    /// Probability of the second class
    pub fn probability(&self, score: f64) -> f64 {
        sigmoid(self.slope * score + self.intercept)
    }

    fn objective(&self, set: &CalibrationSet, slope: f64, intercept: f64) -> f64 {
        let mut value = 0.5 * self.ridge * (slope * slope + intercept * intercept);
        for ((&s, &t), &w) in set.scores.iter().zip(&set.targets).zip(&set.weights) {
            let z = slope * s + intercept;
            value += w * (softplus(z) - t * z);
        }
        value
    }
}

impl Calibrator for LogisticCalibrator {
    fn fit(&mut self, set: &CalibrationSet) -> Result<()> {
        if let Some(s) = set.scores.iter().find(|s| !s.is_finite()) {
            return Err(SVMError::InvalidDataset(format!(
                "non-finite calibration score {}",
                s
            )));
        }

        let (mut positive, mut negative) = (0.0, 0.0);
        for (&t, &w) in set.targets.iter().zip(&set.weights) {
            if t > 0.5 {
                positive += w;
            } else {
                negative += w;
            }
        }

        let mut slope = 0.0;
        let mut intercept = ((positive + 1.0) / (negative + 1.0)).ln();
        let mut fval = self.objective(set, slope, intercept);

        for _ in 0..self.max_iterations {
            let mut h11 = self.ridge;
            let mut h22 = self.ridge;
            let mut h21 = 0.0;
            let mut g1 = self.ridge * slope;
            let mut g2 = self.ridge * intercept;

            for ((&s, &t), &w) in set.scores.iter().zip(&set.targets).zip(&set.weights) {
                let p = sigmoid(slope * s + intercept);
                let d2 = w * p * (1.0 - p);
                h11 += s * s * d2;
                h22 += d2;
                h21 += s * d2;
                let d1 = w * (p - t);
                g1 += s * d1;
                g2 += d1;
            }

            if g1.abs() < GRADIENT_TOLERANCE && g2.abs() < GRADIENT_TOLERANCE {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let (d_slope, d_intercept) = if det > f64::EPSILON * h11 * h22 {
                (-(h22 * g1 - h21 * g2) / det, -(h11 * g2 - h21 * g1) / det)
            } else {
                (-g1, -g2)
            };
            let gd = g1 * d_slope + g2 * d_intercept;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let new_slope = slope + step * d_slope;
                let new_intercept = intercept + step * d_intercept;
                let new_f = self.objective(set, new_slope, new_intercept);
                if new_f < fval + 1e-4 * step * gd {
                    slope = new_slope;
                    intercept = new_intercept;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }
            if step < MIN_STEP {
                log::debug!("logistic calibration line search failed at slope {}", slope);
                break;
            }
        }

        self.slope = slope;
        self.intercept = intercept;
        Ok(())
    }

    fn distribution(&self, score: f64) -> [f64; 2] {
        let p = self.probability(score);
        [1.0 - p, p]
    }

    fn describe(&self) -> String {
        format!(
            "logistic (slope={:.4}, intercept={:.4})",
            self.slope, self.intercept
        )
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}
