//! Probability calibration of binary SVM outputs
//!
//! A calibrator maps the raw margin of a pairwise solver to
//! `[P(first class), P(second class)]`. It is fitted on a [`CalibrationSet`]
//! of (score, target, weight) triples built either from the training outputs
//! directly or from stratified cross-validation.

pub mod logistic;

pub use self::logistic::*;

use crate::core::{CancellationToken, Instance, Result, SMOConfig};
use crate::kernel::Kernel;
use crate::solver::BinarySMO;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt::Debug;

/// Scalar-to-probability model fitted on SVM outputs
pub trait Calibrator: Clone + Debug + Send + Sync {
    /// Fit on (score, target) pairs; target 1.0 means the second class of the pair
    fn fit(&mut self, set: &CalibrationSet) -> Result<()>;

    /// `[P(first class), P(second class)]` for a raw SVM output
    fn distribution(&self, score: f64) -> [f64; 2];

    fn describe(&self) -> String {
        "calibrator".to_string()
    }
}

/// Two-column training data for a calibrator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationSet {
    pub scores: Vec<f64>,
    /// 0.0 for the first class of the pair, 1.0 for the second
    pub targets: Vec<f64>,
    pub weights: Vec<f64>,
}

impl CalibrationSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scores: Vec::with_capacity(capacity),
            targets: Vec::with_capacity(capacity),
            weights: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, score: f64, target: f64, weight: f64) {
        self.scores.push(score);
        self.targets.push(target);
        self.weights.push(weight);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Collect the outputs a calibrator for `smo` is fitted on
///
/// With fewer than 2 folds (`num_folds <= 1`, or a single instance) the
/// trained solver scores its own training data.
/// Otherwise the data is shuffled with `config.seed`, split into stratified
/// folds (at most one per instance) and every fold is scored by a fresh
/// solver trained on the remaining folds.
pub fn build_calibration_set<K, C>(
    smo: &BinarySMO<K, C>,
    data: &[Instance],
    config: &SMOConfig,
    cancel: &CancellationToken,
) -> Result<CalibrationSet>
where
    K: Kernel + Clone,
    C: Calibrator,
{
    let (_, second) = smo.classes();
    let target = |inst: &Instance| if inst.class_index == second { 1.0 } else { 0.0 };

    let mut folds = if config.num_folds > 0 {
        config.num_folds as usize
    } else {
        0
    };
    if folds > data.len() {
        warn!(
            "{} calibration folds requested for {} instances, using {}",
            folds,
            data.len(),
            data.len()
        );
        folds = data.len();
    }

    if folds == 1 {
        warn!("a single calibration fold leaves nothing to train on, using the training outputs");
    }
    if folds < 2 {
        let mut set = CalibrationSet::with_capacity(data.len());
        for inst in data {
            set.push(smo.output(&inst.features), target(inst), inst.weight);
        }
        return Ok(set);
    }

    let assignment = stratified_folds(data, second, folds, config.seed);
    let mut set = CalibrationSet::with_capacity(data.len());
    for fold in 0..folds {
        cancel.check()?;
        let mut train = Vec::with_capacity(data.len());
        let mut test = Vec::new();
        for (inst, &f) in data.iter().zip(&assignment) {
            if f == fold {
                test.push(inst);
            } else {
                train.push(inst.clone());
            }
        }

        let fold_smo: BinarySMO<K, C> = BinarySMO::train(
            &train,
            smo.classes(),
            smo.kernel().clone(),
            None,
            config,
            cancel,
        )?;
        for inst in test {
            set.push(fold_smo.output(&inst.features), target(inst), inst.weight);
        }
    }
    debug!(
        "calibration set of {} outputs from {} folds",
        set.len(),
        folds
    );
    Ok(set)
}

/// Fold number of every instance
///
/// Instances are shuffled, grouped by class and dealt round-robin, so each
/// fold receives the classes in proportion.
fn stratified_folds(data: &[Instance], second: usize, folds: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..data.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let (first_class, second_class): (Vec<usize>, Vec<usize>) = order
        .into_iter()
        .partition(|&i| data[i].class_index != second);

    let mut assignment = vec![0; data.len()];
    for (position, i) in first_class.into_iter().chain(second_class).enumerate() {
        assignment[i] = position % folds;
    }
    assignment
}
