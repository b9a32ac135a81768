//! Core traits: dataset access and the prediction surface

use crate::core::{Instance, Prediction, Result, SparseVector};

/// Read-only access to a labelled training set
pub trait Dataset: Send + Sync {
    /// Number of instances in the dataset
    fn len(&self) -> usize;

    /// Number of features (dimensionality)
    fn dim(&self) -> usize;

    /// Number of class values
    fn num_classes(&self) -> usize;

    /// Get a single instance by index
    ///
    /// # Panics
    /// Panics if index >= len()
    fn instance(&self, i: usize) -> &Instance;

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of instances per class value
    fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes()];
        for i in 0..self.len() {
            let class = self.instance(i).class_index;
            if class < counts.len() {
                counts[class] += 1;
            }
        }
        counts
    }
}

/// A trained model producing a class distribution for a feature vector
pub trait DistributionClassifier: Send + Sync {
    /// Number of class values the model distinguishes
    fn num_classes(&self) -> usize;

    /// Class distribution for one input
    fn distribution(&self, features: &SparseVector) -> Result<Vec<f64>>;

    /// Distribution plus argmax
    fn predict(&self, features: &SparseVector) -> Result<Prediction> {
        self.distribution(features).map(Prediction::from_distribution)
    }

    /// Predict several inputs, stopping at the first error
    fn predict_batch(&self, inputs: &[SparseVector]) -> Result<Vec<Prediction>> {
        inputs.iter().map(|x| self.predict(x)).collect()
    }
}
