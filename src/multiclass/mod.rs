//! One-vs-one multiclass SMO
//!
//! A `K`-class problem is split into `K(K-1)/2` binary problems, one per
//! unordered class pair `(i, j)` with `i < j`. Each pair is trained on the
//! instances of its two classes only. Prediction either counts the pairwise
//! votes or, when calibrators were fitted, couples the pairwise probabilities
//! into one distribution.

pub mod coupling;

pub use self::coupling::pairwise_coupling;

use crate::calibration::{Calibrator, LogisticCalibrator};
use crate::core::{
    CancellationToken, Dataset, DistributionClassifier, Instance, Instances, Result, SMOConfig,
    SVMError, SparseVector,
};
use crate::filter::Preprocessor;
use crate::kernel::{Kernel, KernelType};
use crate::solver::{BinarySMO, DecisionModel};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Trained one-vs-one ensemble of binary SMO solvers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticlassSMO<K = KernelType, C = LogisticCalibrator> {
    kernel: K,
    config: SMOConfig,
    class_names: Vec<String>,
    preprocessor: Option<Preprocessor>,
    /// Pair models in the order (0,1), (0,2), ..., (1,2), ...
    pairs: Vec<BinarySMO<K, C>>,
}

impl<K, C> MulticlassSMO<K, C>
where
    K: Kernel + Clone,
    C: Calibrator,
{
    /// Train one binary solver per class pair
    ///
    /// `calibrator` is the untrained prototype cloned into every pair when
    /// `config.build_calibration` is set. Instances with zero weight are
    /// ignored. The first failing pair (including cancellation) aborts the
    /// whole build.
    pub fn build(
        data: &Instances,
        kernel: K,
        calibrator: C,
        config: SMOConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        kernel.validate()?;

        let num_classes = data.num_classes();
        if num_classes < 2 {
            return Err(SVMError::InvalidDataset(format!(
                "need at least two class values, got {}",
                num_classes
            )));
        }
        if data.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        let mut data = data.clone();
        data.retain(|inst| inst.weight > 0.0);
        if data.is_empty() {
            return Err(SVMError::ZeroWeight);
        }

        let preprocessor = if config.checks_turned_off {
            None
        } else {
            let pre = Preprocessor::fit(&data, config.filter);
            pre.transform_instances(&mut data);
            Some(pre)
        };

        let mut subsets: Vec<Vec<&Instance>> = vec![Vec::new(); num_classes];
        for inst in data.instances() {
            subsets[inst.class_index].push(inst);
        }

        let class_pairs: Vec<(usize, usize)> = (0..num_classes)
            .flat_map(|i| ((i + 1)..num_classes).map(move |j| (i, j)))
            .collect();

        info!(
            "Training {} pairwise {} classifiers on {} instances ({} classes, {} features)",
            class_pairs.len(),
            kernel.describe(),
            data.len(),
            num_classes,
            data.dim()
        );

        // Pairs still running stop once another pair has failed
        let pair_cancel = cancel.child();
        let first_error: Mutex<Option<SVMError>> = Mutex::new(None);

        let fit_pair = |&(i, j): &(usize, usize)| -> Result<BinarySMO<K, C>> {
            let mut subset: Vec<Instance> = subsets[i]
                .iter()
                .chain(&subsets[j])
                .map(|&inst| inst.clone())
                .collect();
            let mut rng = StdRng::seed_from_u64(config.seed);
            subset.shuffle(&mut rng);

            let smo = BinarySMO::train(
                &subset,
                (i, j),
                kernel.clone(),
                config.build_calibration.then(|| calibrator.clone()),
                &config,
                &pair_cancel,
            )?;
            debug!(
                "pair ({}, {}): {} support vectors, b = {:.6}",
                i,
                j,
                smo.support_vectors().len(),
                smo.threshold()
            );
            Ok(smo)
        };

        let train_pair = |pair: &(usize, usize)| -> Result<BinarySMO<K, C>> {
            fit_pair(pair).map_err(|e| {
                if let Ok(mut slot) = first_error.lock() {
                    slot.get_or_insert(e);
                }
                pair_cancel.cancel();
                SVMError::Cancelled
            })
        };

        let trained = if config.num_threads == 1 {
            class_pairs.iter().map(train_pair).collect::<Result<Vec<_>>>()
        } else {
            thread_pool(config.num_threads)?
                .install(|| class_pairs.par_iter().map(train_pair).collect::<Result<Vec<_>>>())
        };
        let pairs = match trained {
            Ok(pairs) => pairs,
            Err(_) => {
                let cause = first_error.into_inner().ok().flatten();
                return Err(cause.unwrap_or(SVMError::Cancelled));
            }
        };

        info!("Trained {} pairwise classifiers", pairs.len());

        Ok(Self {
            kernel,
            config,
            class_names: data.class_names().to_vec(),
            preprocessor,
            pairs,
        })
    }

    /// Class distribution for one input
    ///
    /// Normalised vote counts, or coupled probabilities when the pairs carry
    /// calibrators.
    pub fn distribution(&self, x: &SparseVector) -> Result<Vec<f64>> {
        let k = self.num_classes();
        let filtered;
        let x = match &self.preprocessor {
            Some(pre) => {
                filtered = pre.transform(x);
                &filtered
            }
            None => x,
        };

        if self.config.build_calibration {
            if k == 2 {
                let pair = self.pairs.first().ok_or(SVMError::ModelNotTrained)?;
                let dist = pair
                    .calibrated_distribution(x)
                    .ok_or_else(|| SVMError::Internal("pair (0, 1) has no calibrator".to_string()))?;
                return Ok(dist.to_vec());
            }

            let mut r = vec![vec![0.0; k]; k];
            let mut n = vec![vec![0.0; k]; k];
            for pair in &self.pairs {
                let (i, j) = pair.classes();
                let dist = pair.calibrated_distribution(x).ok_or_else(|| {
                    SVMError::Internal(format!("pair ({}, {}) has no calibrator", i, j))
                })?;
                r[i][j] = dist[0];
                n[i][j] = pair.sum_of_weights();
            }
            return Ok(pairwise_coupling(&n, &r));
        }

        let mut votes = vec![0.0; k];
        for pair in &self.pairs {
            let (i, j) = pair.classes();
            // Neither class had training data
            if pair.num_instances() == 0 {
                continue;
            }
            if pair.output(x) > 0.0 {
                votes[j] += 1.0;
            } else {
                votes[i] += 1.0;
            }
        }
        let total: f64 = votes.iter().sum();
        if total > 0.0 {
            votes.iter_mut().for_each(|v| *v /= total);
        }
        Ok(votes)
    }

    /// Index of the most probable class (first one on ties)
    pub fn classify(&self, x: &SparseVector) -> Result<usize> {
        let dist = self.distribution(x)?;
        let mut best = 0;
        for (i, &p) in dist.iter().enumerate() {
            if p > dist[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// Distributions for many inputs, computed in parallel
    pub fn distributions(&self, inputs: &[SparseVector]) -> Result<Vec<Vec<f64>>> {
        if self.config.num_threads == 1 {
            return inputs.iter().map(|x| self.distribution(x)).collect();
        }
        thread_pool(self.config.num_threads)?
            .install(|| inputs.par_iter().map(|x| self.distribution(x)).collect())
    }
}

impl<K, C> MulticlassSMO<K, C> {
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn config(&self) -> &SMOConfig {
        &self.config
    }

    pub fn preprocessor(&self) -> Option<&Preprocessor> {
        self.preprocessor.as_ref()
    }

    pub fn pairs(&self) -> &[BinarySMO<K, C>] {
        &self.pairs
    }

    /// The solver for classes `i` and `j`, in either order
    pub fn pair(&self, i: usize, j: usize) -> Option<&BinarySMO<K, C>> {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        let k = self.num_classes();
        if i == j || j >= k {
            return None;
        }
        // Pairs starting with a < i come first: sum over a of (k - 1 - a)
        let offset = i * (2 * k - i - 1) / 2;
        self.pairs.get(offset + (j - i - 1))
    }

    pub fn total_support_vectors(&self) -> usize {
        self.pairs.iter().map(|p| p.support_vectors().len()).sum()
    }
}

impl<K, C> DistributionClassifier for MulticlassSMO<K, C>
where
    K: Kernel + Clone,
    C: Calibrator,
{
    fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    fn distribution(&self, features: &SparseVector) -> Result<Vec<f64>> {
        MulticlassSMO::distribution(self, features)
    }

    fn predict_batch(&self, inputs: &[SparseVector]) -> Result<Vec<crate::core::Prediction>> {
        Ok(self
            .distributions(inputs)?
            .into_iter()
            .map(crate::core::Prediction::from_distribution)
            .collect())
    }
}

impl<K: Kernel, C> fmt::Display for MulticlassSMO<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SMO")?;
        writeln!(f)?;
        writeln!(f, "Kernel used:")?;
        writeln!(f, "  {}", self.kernel.describe())?;
        writeln!(
            f,
            "C = {}, tol = {}, filter = {:?}, calibrated = {}",
            self.config.c, self.config.tol, self.config.filter, self.config.build_calibration
        )?;

        for pair in &self.pairs {
            let (i, j) = pair.classes();
            writeln!(f)?;
            writeln!(
                f,
                "Classifier for classes: {}, {}",
                self.class_names[i], self.class_names[j]
            )?;
            match pair.decision_model() {
                DecisionModel::Constant => writeln!(f, "  constant output {}", -pair.threshold())?,
                DecisionModel::Linear { weights } => {
                    for (index, w) in weights.iter() {
                        writeln!(f, "  {:+.4} * x[{}]", w, index)?;
                    }
                }
                DecisionModel::Kernel { support_vectors } => {
                    writeln!(f, "  {} support vectors", support_vectors.len())?;
                }
            }
            writeln!(f, "  - {:.4}", pair.threshold())?;
        }
        Ok(())
    }
}

fn thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| SVMError::Internal(format!("failed to start thread pool: {}", e)))
}
