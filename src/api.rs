//! High-level API for pairwise SMO classification
//!
//! This module provides a builder over [`MulticlassSMO`] plus evaluation
//! helpers, covering the common train / predict / evaluate workflow.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pairsvm::api::SMO;
//! use pairsvm::kernel::RBFKernel;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = SMO::with_kernel(RBFKernel::new(0.5))
//!     .with_c(2.0)
//!     .with_calibration(5)
//!     .train_from_file("train.libsvm")?;
//!
//! let metrics = pairsvm::api::evaluate_file(&model, "test.libsvm")?;
//! println!("Accuracy: {:.2}%", metrics.accuracy() * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::calibration::{Calibrator, LogisticCalibrator};
use crate::core::{
    CancellationToken, Dataset, FilterType, Instances, Result, SMOConfig, SVMError,
};
use crate::data::LibSVMReader;
use crate::kernel::{Kernel, KernelType};
use crate::multiclass::MulticlassSMO;
use std::path::Path;

/// Builder for a one-vs-one SMO classifier
pub struct SMO<K = KernelType, C = LogisticCalibrator> {
    kernel: K,
    calibrator: C,
    config: SMOConfig,
    cancel: CancellationToken,
}

impl SMO<KernelType, LogisticCalibrator> {
    /// Linear kernel, logistic calibration prototype and default parameters
    pub fn new() -> Self {
        Self::with_kernel(KernelType::Linear)
    }
}

impl Default for SMO<KernelType, LogisticCalibrator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Kernel + Clone> SMO<K, LogisticCalibrator> {
    /// Create a builder with a custom kernel
    pub fn with_kernel(kernel: K) -> Self {
        Self {
            kernel,
            calibrator: LogisticCalibrator::new(),
            config: SMOConfig::default(),
            cancel: CancellationToken::new(),
        }
    }
}

impl<K: Kernel + Clone, C: Calibrator> SMO<K, C> {
    /// Use another calibrator type for probability estimates
    pub fn with_calibrator<C2: Calibrator>(self, calibrator: C2) -> SMO<K, C2> {
        SMO {
            kernel: self.kernel,
            calibrator,
            config: self.config,
            cancel: self.cancel,
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: SMOConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the complexity constant C
    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    /// Set the KKT tolerance
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.config.tol = tol;
        self
    }

    /// Set the round-off epsilon
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.config.eps = eps;
        self
    }

    /// Fit calibrators; `num_folds < 2` uses the training outputs directly
    pub fn with_calibration(mut self, num_folds: i32) -> Self {
        self.config.build_calibration = true;
        self.config.num_folds = num_folds;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.config.filter = filter;
        self
    }

    /// Worker threads for pair training (1 = sequential, 0 = all cores)
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads;
        self
    }

    /// Set the kernel cache size in entries (0 disables caching)
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.config.cache_size = cache_size;
        self
    }

    /// Stop each binary optimisation after `max_passes` outer passes
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.config.max_passes = Some(max_passes);
        self
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &SMOConfig {
        &self.config
    }

    /// Train on a dataset
    pub fn train(self, data: &Instances) -> Result<MulticlassSMO<K, C>> {
        MulticlassSMO::build(data, self.kernel, self.calibrator, self.config, &self.cancel)
    }

    /// Train from LibSVM format file
    pub fn train_from_file<P: AsRef<Path>>(self, path: P) -> Result<MulticlassSMO<K, C>> {
        let data = LibSVMReader::from_file(path)?.into_instances()?;
        self.train(&data)
    }
}

/// Accuracy and confusion matrix of a multiclass evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationMetrics {
    /// `confusion[actual][predicted]`
    pub confusion: Vec<Vec<usize>>,
}

impl EvaluationMetrics {
    pub fn new(num_classes: usize) -> Self {
        Self {
            confusion: vec![vec![0; num_classes]; num_classes],
        }
    }

    pub fn record(&mut self, actual: usize, predicted: usize) {
        self.confusion[actual][predicted] += 1;
    }

    pub fn total(&self) -> usize {
        self.confusion.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.confusion.len()).map(|i| self.confusion[i][i]).sum()
    }

    /// Calculate accuracy: correct / total
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.correct() as f64 / total as f64
        }
    }

    /// Instances whose true class is `class`
    pub fn support(&self, class: usize) -> usize {
        self.confusion[class].iter().sum()
    }

    /// Calculate precision of `class`: TP / (TP + FP)
    pub fn precision(&self, class: usize) -> f64 {
        let predicted: usize = self.confusion.iter().map(|row| row[class]).sum();
        if predicted == 0 {
            0.0
        } else {
            self.confusion[class][class] as f64 / predicted as f64
        }
    }

    /// Calculate recall of `class`: TP / (TP + FN)
    pub fn recall(&self, class: usize) -> f64 {
        let actual = self.support(class);
        if actual == 0 {
            0.0
        } else {
            self.confusion[class][class] as f64 / actual as f64
        }
    }

    /// Calculate F1 score of `class`
    pub fn f1_score(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * (p * r) / (p + r)
        }
    }
}

/// Classify every instance of `data` and tally the results
pub fn evaluate<K, C>(model: &MulticlassSMO<K, C>, data: &Instances) -> Result<EvaluationMetrics>
where
    K: Kernel + Clone,
    C: Calibrator,
{
    if data.num_classes() != model.num_classes() {
        return Err(SVMError::InvalidDataset(format!(
            "data has {} classes, model has {}",
            data.num_classes(),
            model.num_classes()
        )));
    }
    let inputs: Vec<_> = data.instances().iter().map(|i| i.features.clone()).collect();
    let distributions = model.distributions(&inputs)?;

    let mut metrics = EvaluationMetrics::new(model.num_classes());
    for (inst, dist) in data.instances().iter().zip(distributions) {
        let predicted = crate::core::Prediction::from_distribution(dist).class_index;
        metrics.record(inst.class_index, predicted);
    }
    Ok(metrics)
}

/// Evaluate on a LibSVM file whose labels use the model's classes
pub fn evaluate_file<K, C, P>(model: &MulticlassSMO<K, C>, path: P) -> Result<EvaluationMetrics>
where
    K: Kernel + Clone,
    C: Calibrator,
    P: AsRef<Path>,
{
    let data = LibSVMReader::from_file(path)?.into_instances_with_classes(model.class_names())?;
    evaluate(model, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::PolynomialKernel;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_smo_builder_pattern() {
        let smo = SMO::new()
            .with_c(2.0)
            .with_tol(0.01)
            .with_calibration(3)
            .with_threads(0)
            .with_max_passes(50);

        assert_eq!(smo.config().c, 2.0);
        assert_eq!(smo.config().tol, 0.01);
        assert!(smo.config().build_calibration);
        assert_eq!(smo.config().num_folds, 3);
        assert_eq!(smo.config().num_threads, 0);
        assert_eq!(smo.config().max_passes, Some(50));
    }

    #[test]
    fn test_evaluation_metrics() {
        let mut metrics = EvaluationMetrics::new(3);
        for (actual, predicted) in [(0, 0), (0, 0), (0, 1), (1, 1), (2, 2), (2, 1)] {
            metrics.record(actual, predicted);
        }

        assert_eq!(metrics.total(), 6);
        assert_eq!(metrics.accuracy(), 4.0 / 6.0);
        assert_eq!(metrics.precision(1), 1.0 / 3.0);
        assert_eq!(metrics.recall(0), 2.0 / 3.0);
        assert_eq!(metrics.support(2), 2);
        assert!(metrics.f1_score(2) > 0.0);
        assert_eq!(EvaluationMetrics::new(2).accuracy(), 0.0);
    }

    #[test]
    fn test_file_operations() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        for line in [
            "1 1:2.0 2:0.1",
            "1 1:2.5 2:0.3",
            "2 1:-2.0 2:0.2",
            "2 1:-1.5 2:0.0",
            "3 1:0.1 2:3.0",
            "3 1:0.2 2:2.5",
        ] {
            writeln!(temp_file, "{}", line).expect("Failed to write");
        }
        temp_file.flush().expect("Failed to flush");

        let model = SMO::with_kernel(PolynomialKernel::new(2, 1.0, 1.0))
            .with_c(10.0)
            .train_from_file(temp_file.path())
            .expect("Training should succeed");
        assert_eq!(model.class_names(), &["1", "2", "3"]);

        let metrics = evaluate_file(&model, temp_file.path()).expect("Evaluation should succeed");
        assert_eq!(metrics.accuracy(), 1.0);
    }
}
