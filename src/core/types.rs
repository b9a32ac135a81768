//! Core type definitions: sparse vectors, weighted instances and datasets

use crate::core::traits::Dataset;
use crate::core::{Result, SVMError};
use serde::{Deserialize, Serialize};

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from a dense slice, dropping exact zeros
    pub fn from_dense(values: &[f64]) -> Self {
        let (indices, values) = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .unzip();
        Self { indices, values }
    }

    /// Expand into a dense vector of length `dim`
    ///
    /// Indices at or beyond `dim` are ignored.
    pub fn to_dense(&self, dim: usize) -> Vec<f64> {
        let mut dense = vec![0.0; dim];
        for (&i, &v) in self.indices.iter().zip(&self.values) {
            if i < dim {
                dense[i] = v;
            }
        }
        dense
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Iterate over the stored (index, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Dot product with another sparse vector
    ///
    /// Both index lists are sorted, so a merge walk is O(nnz(x) + nnz(y)).
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let mut result = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < self.indices.len() && j < other.indices.len() {
            let a = self.indices[i];
            let b = other.indices[j];

            if a == b {
                result += self.values[i] * other.values[j];
                i += 1;
                j += 1;
            } else if a < b {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }

    /// Dot product with a dense vector; indices past its end count as zero
    pub fn dot_dense(&self, dense: &[f64]) -> f64 {
        self.iter()
            .filter(|&(i, _)| i < dense.len())
            .map(|(i, v)| v * dense[i])
            .sum()
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Compute L2 norm
    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Largest stored index plus one (0 for an empty vector)
    pub fn extent(&self) -> usize {
        self.indices.last().map_or(0, |&i| i + 1)
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// One weighted, labelled training example
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Feature vector (sparse representation)
    pub features: SparseVector,
    /// Index of the class value, in `0..num_classes`
    pub class_index: usize,
    /// Non-negative instance weight; scales the box constraint to `C * weight`
    pub weight: f64,
}

impl Instance {
    /// Create an instance with unit weight
    pub fn new(features: SparseVector, class_index: usize) -> Self {
        Self::weighted(features, class_index, 1.0)
    }

    /// Create an instance with an explicit weight
    pub fn weighted(features: SparseVector, class_index: usize, weight: f64) -> Self {
        Self {
            features,
            class_index,
            weight,
        }
    }
}

/// In-memory training set with a nominal class of `num_classes` values
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instances {
    instances: Vec<Instance>,
    dimensions: usize,
    class_names: Vec<String>,
}

impl Instances {
    /// Create a dataset with `num_classes` anonymous class values ("0", "1", ...)
    pub fn new(num_classes: usize, dimensions: usize) -> Self {
        Self::with_class_names((0..num_classes).map(|c| c.to_string()).collect(), dimensions)
    }

    /// Create a dataset with named class values
    pub fn with_class_names(class_names: Vec<String>, dimensions: usize) -> Self {
        Self {
            instances: Vec::new(),
            dimensions,
            class_names,
        }
    }

    /// Empty copy sharing this dataset's header (class values and dimensionality)
    pub fn empty_like(&self) -> Self {
        Self::with_class_names(self.class_names.clone(), self.dimensions)
    }

    /// Append an instance, growing the dimensionality if needed
    pub fn push(&mut self, instance: Instance) -> Result<()> {
        if instance.class_index >= self.class_names.len() {
            return Err(SVMError::InvalidDataset(format!(
                "class index {} out of range for {} classes",
                instance.class_index,
                self.class_names.len()
            )));
        }
        if !instance.weight.is_finite() || instance.weight < 0.0 {
            return Err(SVMError::InvalidDataset(format!(
                "instance weight must be finite and non-negative, got {}",
                instance.weight
            )));
        }
        self.dimensions = self.dimensions.max(instance.features.extent());
        self.instances.push(instance);
        Ok(())
    }

    /// Names of the class values, indexed by class index
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// All instances in order
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Mutable access for in-place preprocessing
    pub(crate) fn instances_mut(&mut self) -> &mut [Instance] {
        &mut self.instances
    }

    /// Keep only the instances matching `keep`
    pub fn retain<F: FnMut(&Instance) -> bool>(&mut self, keep: F) {
        self.instances.retain(keep);
    }

    /// Sum of instance weights
    pub fn sum_of_weights(&self) -> f64 {
        self.instances.iter().map(|inst| inst.weight).sum()
    }
}

impl Dataset for Instances {
    fn len(&self) -> usize {
        self.instances.len()
    }

    fn dim(&self) -> usize {
        self.dimensions
    }

    fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    fn instance(&self, i: usize) -> &Instance {
        &self.instances[i]
    }
}

/// Prediction result: class distribution plus its argmax
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the most probable class
    pub class_index: usize,
    /// Probability (or normalised vote share) per class
    pub distribution: Vec<f64>,
}

impl Prediction {
    /// Build a prediction from a distribution, picking the first maximum
    pub fn from_distribution(distribution: Vec<f64>) -> Self {
        let class_index = distribution
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            })
            .0;
        Self {
            class_index,
            distribution,
        }
    }

    /// Probability assigned to the predicted class
    pub fn confidence(&self) -> f64 {
        self.distribution
            .get(self.class_index)
            .copied()
            .unwrap_or(0.0)
    }
}
