//! Binary Sequential Minimal Optimization solver
//!
//! Solves the soft-margin SVM dual for one pair of classes using Platt's
//! two-variable step with the threshold bookkeeping of Keerthi, Shevade,
//! Bhattacharyya and Murthy ("Improvements to Platt's SMO Algorithm for SVM
//! Classifier Design"). Instead of a single threshold the trainer keeps the
//! bracket `b_up <= b <= b_low`, computed from the error cache of the free
//! examples, and stops once no example violates the KKT conditions by more
//! than `2 * tol`.
//!
//! The first class of the pair is mapped to the pseudo-label -1 and the
//! second to +1, so a positive output votes for the second class.

use crate::calibration::{build_calibration_set, Calibrator, LogisticCalibrator};
use crate::core::{CancellationToken, Instance, Result, SMOConfig, SVMError, SparseVector};
use crate::kernel::{Kernel, KernelEvaluator, KernelStats};
use crate::solver::index_set::{IndexSet, PartitionSets};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

/// Examined indices between two polls of the cancellation token
const CANCEL_CHECK_INTERVAL: usize = 1000;

/// Kernel lookups between two polls inside the output and error-cache loops
const CANCEL_EVAL_STRIDE: u64 = 100_000;

/// A training example with a non-zero multiplier, kept for kernel prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportVector {
    /// Position in the pair's training subset
    pub index: usize,
    pub alpha: f64,
    /// Pseudo-label, -1 for the first class of the pair and +1 for the second
    pub label: f64,
    pub features: SparseVector,
}

/// What the trained solver keeps for prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionModel {
    /// Only one class (or none) was present; the output is the constant `-b`
    Constant,
    /// Linear kernel: explicit weight vector, no support vectors retained
    Linear { weights: SparseVector },
    /// Any other kernel: the support vectors and their multipliers
    Kernel { support_vectors: Vec<SupportVector> },
}

/// Bookkeeping of one training run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    /// Outer passes over the examples
    pub passes: usize,
    /// Successful joint two-variable updates
    pub steps: usize,
    pub kernel: KernelStats,
}

/// Two-class SVM trained by SMO, optionally carrying a probability calibrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinarySMO<K, C = LogisticCalibrator> {
    kernel: K,
    classes: (usize, usize),
    b: f64,
    model: DecisionModel,
    sum_of_weights: f64,
    num_instances: usize,
    stats: TrainingStats,
    calibrator: Option<C>,
}

impl<K, C> BinarySMO<K, C>
where
    K: Kernel + Clone,
    C: Calibrator,
{
    /// Train on the instances of `classes.0` and `classes.1`
    ///
    /// Every instance must belong to one of the two classes and carry a positive
    /// weight. When `calibrator` is given it is fitted on held-out SVM outputs
    /// (see [`build_calibration_set`]) after the multipliers are settled.
    pub fn train(
        data: &[Instance],
        classes: (usize, usize),
        kernel: K,
        calibrator: Option<C>,
        config: &SMOConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let mut labels = Vec::with_capacity(data.len());
        let mut sum_of_weights = 0.0;
        for (i, inst) in data.iter().enumerate() {
            let label = if inst.class_index == classes.0 {
                -1.0
            } else if inst.class_index == classes.1 {
                1.0
            } else {
                return Err(SVMError::InvalidDataset(format!(
                    "instance {} has class {}, expected {} or {}",
                    i, inst.class_index, classes.0, classes.1
                )));
            };
            if !inst.weight.is_finite() || inst.weight <= 0.0 {
                return Err(SVMError::InvalidDataset(format!(
                    "instance {} has non-positive weight {}",
                    i, inst.weight
                )));
            }
            labels.push(label);
            sum_of_weights += inst.weight;
        }

        let has_negative = labels.iter().any(|&y| y < 0.0);
        let has_positive = labels.iter().any(|&y| y > 0.0);

        let mut smo = if has_negative && has_positive {
            let points: Vec<SparseVector> = data.iter().map(|inst| inst.features.clone()).collect();
            let bounds: Vec<f64> = data.iter().map(|inst| config.c * inst.weight).collect();
            let mut trainer = Trainer::new(&kernel, &points, labels, bounds, config, cancel);
            trainer.optimize()?;
            let (b, model, stats) = trainer.compact();
            debug!(
                "pair ({}, {}): {} instances, {} passes, {} steps, b = {:.6}, {} kernel evals, {} cache hits",
                classes.0,
                classes.1,
                data.len(),
                stats.passes,
                stats.steps,
                b,
                stats.kernel.evaluations,
                stats.kernel.cache_hits
            );
            Self {
                kernel,
                classes,
                b,
                model,
                sum_of_weights,
                num_instances: data.len(),
                stats,
                calibrator: None,
            }
        } else {
            // One class missing: answer with that class everywhere
            let b = if has_positive {
                -1.0
            } else if has_negative {
                1.0
            } else {
                0.0
            };
            debug!(
                "pair ({}, {}): single-class subset of {} instances, constant output {}",
                classes.0,
                classes.1,
                data.len(),
                -b
            );
            Self {
                kernel,
                classes,
                b,
                model: DecisionModel::Constant,
                sum_of_weights,
                num_instances: data.len(),
                stats: TrainingStats::default(),
                calibrator: None,
            }
        };

        if let Some(calibrator) = calibrator {
            smo.calibrate(calibrator, data, config, cancel)?;
        }

        Ok(smo)
    }

    /// Fit `calibrator` on outputs for `data` and attach it
    ///
    /// `data` must be the set the solver was trained on; with `num_folds > 0`
    /// the outputs come from fresh solvers trained on the other folds.
    pub fn calibrate(
        &mut self,
        mut calibrator: C,
        data: &[Instance],
        config: &SMOConfig,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let set = build_calibration_set(self, data, config, cancel)?;
        calibrator.fit(&set)?;
        debug!(
            "pair ({}, {}): calibrated on {} outputs, {}",
            self.classes.0,
            self.classes.1,
            set.len(),
            calibrator.describe()
        );
        self.calibrator = Some(calibrator);
        Ok(())
    }

    /// Signed margin of `x`: positive favours the second class of the pair
    pub fn output(&self, x: &SparseVector) -> f64 {
        let sum = match &self.model {
            DecisionModel::Constant => 0.0,
            DecisionModel::Linear { weights } => weights.dot(x),
            DecisionModel::Kernel { support_vectors } => support_vectors
                .iter()
                .map(|sv| sv.label * sv.alpha * self.kernel.compute(&sv.features, x))
                .sum(),
        };
        sum - self.b
    }

    /// Calibrated `[P(first class), P(second class)]`, if a calibrator was fitted
    pub fn calibrated_distribution(&self, x: &SparseVector) -> Option<[f64; 2]> {
        self.calibrator
            .as_ref()
            .map(|cal| cal.distribution(self.output(x)))
    }
}

impl<K, C> BinarySMO<K, C> {
    /// The class pair `(first, second)`; the first maps to output < 0
    pub fn classes(&self) -> (usize, usize) {
        self.classes
    }

    pub fn threshold(&self) -> f64 {
        self.b
    }

    pub fn decision_model(&self) -> &DecisionModel {
        &self.model
    }

    /// True when the subset held a single class and the output is constant
    pub fn is_trivial(&self) -> bool {
        matches!(self.model, DecisionModel::Constant)
    }

    /// Support vectors (empty for the linear and constant models)
    pub fn support_vectors(&self) -> &[SupportVector] {
        match &self.model {
            DecisionModel::Kernel { support_vectors } => support_vectors,
            _ => &[],
        }
    }

    /// Weight vector of a linear model
    pub fn weights(&self) -> Option<&SparseVector> {
        match &self.model {
            DecisionModel::Linear { weights } => Some(weights),
            _ => None,
        }
    }

    pub fn sum_of_weights(&self) -> f64 {
        self.sum_of_weights
    }

    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    /// Kernel evaluations and cache hits spent on training
    pub fn kernel_stats(&self) -> KernelStats {
        self.stats.kernel
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn calibrator(&self) -> Option<&C> {
        self.calibrator.as_ref()
    }
}

/// Mutable optimisation state of one training run
///
/// Every field is owned by the run; nothing here outlives `compact`.
struct Trainer<'a, K: Kernel> {
    config: &'a SMOConfig,
    cancel: &'a CancellationToken,
    points: &'a [SparseVector],
    labels: Vec<f64>,
    /// Per-example box `C * weight`
    bounds: Vec<f64>,
    alpha: Vec<f64>,
    /// Cached `output - label`, valid for indices in `sets.free`
    errors: Vec<f64>,
    sets: PartitionSets,
    support: IndexSet,
    b_up: f64,
    b_low: f64,
    i_up: Option<usize>,
    i_low: Option<usize>,
    /// Dense weight vector, maintained only for linear kernels
    weights: Option<Vec<f64>>,
    evaluator: KernelEvaluator<'a, K>,
    /// Kernel lookup count at which the cancellation token is polled next
    next_cancel_check: u64,
    steps: usize,
    passes: usize,
}

impl<'a, K: Kernel> Trainer<'a, K> {
    /// Initial state: all multipliers zero, `b_up = -1`, `b_low = 1`
    ///
    /// Both pseudo-labels must be present.
    fn new(
        kernel: &'a K,
        points: &'a [SparseVector],
        labels: Vec<f64>,
        bounds: Vec<f64>,
        config: &'a SMOConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        let n = labels.len();
        let i_low = labels.iter().rposition(|&y| y < 0.0);
        let i_up = labels.iter().rposition(|&y| y > 0.0);

        let mut errors = vec![0.0; n];
        if let Some(i) = i_low {
            errors[i] = 1.0;
        }
        if let Some(i) = i_up {
            errors[i] = -1.0;
        }

        let weights = kernel.is_linear().then(|| {
            let dim = points.iter().map(SparseVector::extent).max().unwrap_or(0);
            vec![0.0; dim]
        });

        Self {
            config,
            cancel,
            points,
            sets: PartitionSets::initial(&labels),
            labels,
            bounds,
            alpha: vec![0.0; n],
            errors,
            support: IndexSet::with_capacity(n),
            b_up: -1.0,
            b_low: 1.0,
            i_up,
            i_low,
            weights,
            evaluator: KernelEvaluator::build(kernel, points, config.cache_size),
            next_cancel_check: CANCEL_EVAL_STRIDE,
            steps: 0,
            passes: 0,
        }
    }

    /// Alternate full sweeps and sweeps over the free examples until a full
    /// sweep changes nothing
    fn optimize(&mut self) -> Result<()> {
        let n = self.labels.len();
        let two_tol = 2.0 * self.config.tol;
        let mut num_changed = 0usize;
        let mut examine_all = true;
        let mut examined = 0usize;

        while num_changed > 0 || examine_all {
            self.cancel.check()?;
            if let Some(max_passes) = self.config.max_passes {
                if self.passes >= max_passes {
                    warn!(
                        "SMO stopped after {} passes without converging (b_up = {:.6}, b_low = {:.6})",
                        self.passes, self.b_up, self.b_low
                    );
                    break;
                }
            }

            num_changed = 0;
            if examine_all {
                for i in 0..n {
                    examined += 1;
                    if examined % CANCEL_CHECK_INTERVAL == 0 {
                        self.cancel.check()?;
                    }
                    if self.examine_example(i)? {
                        num_changed += 1;
                    }
                }
            } else {
                for i in 0..n {
                    if self.alpha[i] > 0.0 && self.alpha[i] < self.bounds[i] {
                        examined += 1;
                        if examined % CANCEL_CHECK_INTERVAL == 0 {
                            self.cancel.check()?;
                        }
                        if self.examine_example(i)? {
                            num_changed += 1;
                        }
                        // Free examples are optimal once the bracket closes
                        if self.b_up > self.b_low - two_tol {
                            num_changed = 0;
                            break;
                        }
                    }
                }
            }

            if examine_all {
                examine_all = false;
            } else if num_changed == 0 {
                examine_all = true;
            }
            self.passes += 1;
            trace!(
                "pass {}: {} changed, b_up = {:.6}, b_low = {:.6}",
                self.passes,
                num_changed,
                self.b_up,
                self.b_low
            );
        }

        Ok(())
    }

    /// `sum_j y_j alpha_j K(x_j, x_i)` without the threshold
    fn output_for_index(&mut self, i: usize) -> Result<f64> {
        if let Some(weights) = &self.weights {
            return Ok(self.points[i].dot_dense(weights));
        }
        let mut sum = 0.0;
        for j in self.support.iter() {
            sum += self.labels[j] * self.alpha[j] * self.evaluator.eval(i, j);
            poll_cancel(self.cancel, &self.evaluator, &mut self.next_cancel_check)?;
        }
        Ok(sum)
    }

    /// Same sum as `output_for_index`, always via kernel evaluations against the support set
    #[cfg(test)]
    fn output_by_kernel(&mut self, x: &SparseVector) -> f64 {
        let mut sum = 0.0;
        for j in self.support.iter() {
            sum += self.labels[j] * self.alpha[j] * self.evaluator.eval_external(x, j);
        }
        sum
    }

    /// Check the KKT conditions of `i2` and, if violated, optimise it jointly
    /// with the current `i_low` or `i_up`
    fn examine_example(&mut self, i2: usize) -> Result<bool> {
        let y2 = self.labels[i2];
        let two_tol = 2.0 * self.config.tol;

        let f2 = if self.sets.free.contains(i2) {
            self.errors[i2]
        } else {
            let f2 = self.output_for_index(i2)? - y2;
            self.errors[i2] = f2;

            if (self.sets.pos_at_zero.contains(i2) || self.sets.neg_at_bound.contains(i2))
                && f2 < self.b_up
            {
                self.b_up = f2;
                self.i_up = Some(i2);
            } else if (self.sets.pos_at_bound.contains(i2) || self.sets.neg_at_zero.contains(i2))
                && f2 > self.b_low
            {
                self.b_low = f2;
                self.i_low = Some(i2);
            }
            f2
        };

        let mut optimal = true;
        let mut i1 = None;
        if self.sets.is_up_candidate(i2) && self.b_low - f2 > two_tol {
            optimal = false;
            i1 = self.i_low;
        }
        if self.sets.is_low_candidate(i2) && f2 - self.b_up > two_tol {
            optimal = false;
            i1 = self.i_up;
        }
        if optimal {
            return Ok(false);
        }

        // A free example may pair with either end of the bracket; take the larger gap
        if self.sets.free.contains(i2) {
            i1 = if self.b_low - f2 > f2 - self.b_up {
                self.i_low
            } else {
                self.i_up
            };
        }

        let i1 = i1.ok_or_else(|| {
            SVMError::Internal(format!(
                "no partner index for KKT-violating example {}",
                i2
            ))
        })?;
        self.take_step(i1, i2, f2)
    }

    /// Jointly optimise the multipliers of `i1` and `i2`
    ///
    /// Returns `Ok(false)` when no progress is possible.
    fn take_step(&mut self, i1: usize, i2: usize, f2: f64) -> Result<bool> {
        if i1 == i2 {
            return Ok(false);
        }

        let eps = self.config.eps;
        let snap = self.config.snap_fraction;
        let c1 = self.bounds[i1];
        let c2 = self.bounds[i2];
        let alph1 = self.alpha[i1];
        let alph2 = self.alpha[i2];
        let y1 = self.labels[i1];
        let y2 = self.labels[i2];
        let f1 = self.errors[i1];
        let s = y1 * y2;

        let (low, high) = if y1 != y2 {
            ((alph2 - alph1).max(0.0), c2.min(c1 + alph2 - alph1))
        } else {
            ((alph1 + alph2 - c1).max(0.0), c2.min(alph1 + alph2))
        };
        if low >= high {
            return Ok(false);
        }

        let k11 = self.evaluator.eval(i1, i1);
        let k12 = self.evaluator.eval(i1, i2);
        let k22 = self.evaluator.eval(i2, i2);
        let eta = 2.0 * k12 - k11 - k22;

        let mut a2 = if eta < 0.0 {
            (alph2 - y2 * (f1 - f2) / eta).clamp(low, high)
        } else {
            // Objective is not strictly concave along the constraint line:
            // compare it at both ends of the segment
            let out1 = self.output_for_index(i1)?;
            let out2 = self.output_for_index(i2)?;
            let v1 = out1 - y1 * alph1 * k11 - y2 * alph2 * k12;
            let v2 = out2 - y1 * alph1 * k12 - y2 * alph2 * k22;
            let gamma = alph1 + s * alph2;
            let objective = |a2: f64| {
                let a1 = gamma - s * a2;
                a1 + a2 - 0.5 * k11 * a1 * a1 - 0.5 * k22 * a2 * a2 - s * k12 * a1 * a2
                    - y1 * a1 * v1
                    - y2 * a2 * v2
            };
            let low_obj = objective(low);
            let high_obj = objective(high);
            if low_obj > high_obj + eps {
                low
            } else if low_obj < high_obj - eps {
                high
            } else {
                alph2
            }
        };

        if (a2 - alph2).abs() < eps * (a2 + alph2 + eps) {
            return Ok(false);
        }

        if a2 > c2 - snap * c2 {
            a2 = c2;
        } else if a2 <= snap * c2 {
            a2 = 0.0;
        }
        let mut a1 = alph1 + s * (alph2 - a2);
        if a1 > c1 - snap * c1 {
            a1 = c1;
        } else if a1 <= snap * c1 {
            a1 = 0.0;
        }
        debug_assert!((0.0..=c1).contains(&a1) && (0.0..=c2).contains(&a2));

        self.update_sets(i1, a1);
        self.update_sets(i2, a2);

        let delta1 = y1 * (a1 - alph1);
        let delta2 = y2 * (a2 - alph2);

        if let Some(weights) = self.weights.as_mut() {
            for (idx, v) in self.points[i1].iter() {
                weights[idx] += delta1 * v;
            }
            for (idx, v) in self.points[i2].iter() {
                weights[idx] += delta2 * v;
            }
        }

        self.update_error_cache(i1, i2, delta1, delta2, k11, k12, k22)?;

        self.alpha[i1] = a1;
        self.alpha[i2] = a2;

        self.recompute_thresholds(i1, i2)?;
        self.steps += 1;
        Ok(true)
    }

    /// File `i` under the partition and support sets matching its new multiplier
    fn update_sets(&mut self, i: usize, alpha: f64) {
        self.support.set(i, alpha > 0.0);
        self.sets.classify(i, self.labels[i], alpha, self.bounds[i]);
    }

    /// Shift the cached errors of the free set by the change in `i1` and `i2`
    #[allow(clippy::too_many_arguments)]
    fn update_error_cache(
        &mut self,
        i1: usize,
        i2: usize,
        delta1: f64,
        delta2: f64,
        k11: f64,
        k12: f64,
        k22: f64,
    ) -> Result<()> {
        for j in self.sets.free.iter() {
            if j != i1 && j != i2 {
                self.errors[j] +=
                    delta1 * self.evaluator.eval(i1, j) + delta2 * self.evaluator.eval(i2, j);
                poll_cancel(self.cancel, &self.evaluator, &mut self.next_cancel_check)?;
            }
        }
        self.errors[i1] += delta1 * k11 + delta2 * k12;
        self.errors[i2] += delta1 * k12 + delta2 * k22;
        Ok(())
    }

    /// Rebuild `b_up`/`b_low` from the free set plus the two changed indices
    fn recompute_thresholds(&mut self, i1: usize, i2: usize) -> Result<()> {
        self.b_low = f64::MIN;
        self.b_up = f64::MAX;
        self.i_low = None;
        self.i_up = None;

        for j in self.sets.free.iter() {
            let e = self.errors[j];
            if e < self.b_up {
                self.b_up = e;
                self.i_up = Some(j);
            }
            if e > self.b_low {
                self.b_low = e;
                self.i_low = Some(j);
            }
        }

        for i in [i1, i2] {
            if self.sets.free.contains(i) {
                continue;
            }
            let e = self.errors[i];
            if self.sets.pos_at_bound.contains(i) || self.sets.neg_at_zero.contains(i) {
                if e > self.b_low {
                    self.b_low = e;
                    self.i_low = Some(i);
                }
            } else if e < self.b_up {
                self.b_up = e;
                self.i_up = Some(i);
            }
        }

        if self.i_low.is_none() || self.i_up.is_none() {
            return Err(SVMError::Internal(format!(
                "threshold bracket lost after updating {} and {}",
                i1, i2
            )));
        }
        Ok(())
    }

    /// Final threshold and the state needed for prediction
    ///
    /// Linear kernels keep only the weight vector; other kernels keep the
    /// support vectors. The kernel cache is released either way.
    fn compact(mut self) -> (f64, DecisionModel, TrainingStats) {
        let b = (self.b_low + self.b_up) / 2.0;
        self.evaluator.clean();
        let stats = TrainingStats {
            passes: self.passes,
            steps: self.steps,
            kernel: self.evaluator.stats(),
        };

        let model = match self.weights.take() {
            Some(weights) => DecisionModel::Linear {
                weights: SparseVector::from_dense(&weights),
            },
            None => {
                let mut indices: Vec<usize> = self.support.iter().collect();
                indices.sort_unstable();
                let support_vectors = indices
                    .into_iter()
                    .map(|i| SupportVector {
                        index: i,
                        alpha: self.alpha[i],
                        label: self.labels[i],
                        features: self.points[i].clone(),
                    })
                    .collect();
                DecisionModel::Kernel { support_vectors }
            }
        };
        (b, model, stats)
    }
}

/// Poll `cancel` once the evaluator has served `*next_check` kernel lookups
fn poll_cancel<K: Kernel>(
    cancel: &CancellationToken,
    evaluator: &KernelEvaluator<'_, K>,
    next_check: &mut u64,
) -> Result<()> {
    let lookups = evaluator.num_evals() + evaluator.num_cache_hits();
    if lookups >= *next_check {
        cancel.check()?;
        *next_check = lookups + CANCEL_EVAL_STRIDE;
    }
    Ok(())
}
