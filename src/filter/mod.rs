//! Input preprocessing applied before training and prediction
//!
//! Missing values (NaN) are replaced with the training mean of their feature,
//! then features are rescaled according to [`FilterType`]. Statistics are
//! fitted once on the training data and stored with the model so prediction
//! inputs go through exactly the same mapping.

use crate::core::{Dataset, FilterType, Instances, SparseVector};
use serde::{Deserialize, Serialize};

/// Training statistics of a single feature, over its non-missing values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    filter: FilterType,
    features: Vec<FeatureStats>,
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
    stored: usize,
    missing: usize,
}

impl Preprocessor {
    /// Compute per-feature statistics from the training data
    ///
    /// Features absent from a sparse instance count as zeros.
    pub fn fit<D: Dataset>(data: &D, filter: FilterType) -> Self {
        let n = data.len();
        let mut acc: Vec<Accumulator> = (0..data.dim())
            .map(|_| Accumulator {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
                ..Accumulator::default()
            })
            .collect();

        for i in 0..n {
            for (j, v) in data.instance(i).features.iter() {
                let Some(a) = acc.get_mut(j) else { continue };
                a.stored += 1;
                if v.is_nan() {
                    a.missing += 1;
                    continue;
                }
                a.sum += v;
                a.sum_sq += v * v;
                a.min = a.min.min(v);
                a.max = a.max.max(v);
            }
        }

        let features = acc
            .into_iter()
            .map(|a| {
                let present = n - a.missing;
                if present == 0 {
                    return FeatureStats::default();
                }
                let (mut min, mut max) = (a.min, a.max);
                if a.stored < n {
                    min = min.min(0.0);
                    max = max.max(0.0);
                }
                let mean = a.sum / present as f64;
                let std = if present > 1 {
                    ((a.sum_sq - present as f64 * mean * mean) / (present - 1) as f64)
                        .max(0.0)
                        .sqrt()
                } else {
                    0.0
                };
                FeatureStats {
                    min,
                    max,
                    mean,
                    std,
                }
            })
            .collect();

        Self { filter, features }
    }

    pub fn filter(&self) -> FilterType {
        self.filter
    }

    /// Number of features the statistics were fitted on
    pub fn dim(&self) -> usize {
        self.features.len()
    }

    pub fn feature_stats(&self) -> &[FeatureStats] {
        &self.features
    }

    /// Apply missing-value replacement and scaling to one input
    ///
    /// Features beyond the fitted dimensionality pass through unchanged.
    pub fn transform(&self, x: &SparseVector) -> SparseVector {
        match self.filter {
            FilterType::None => {
                let values = x
                    .iter()
                    .map(|(j, v)| match self.features.get(j) {
                        Some(stats) if v.is_nan() => stats.mean,
                        _ => v,
                    })
                    .collect();
                SparseVector::new(x.indices.clone(), values)
            }
            FilterType::Normalize | FilterType::Standardize => {
                let dim = self.features.len();
                let dense = x.to_dense(dim);
                let out: Vec<f64> = dense
                    .iter()
                    .zip(&self.features)
                    .map(|(&v, stats)| {
                        let v = if v.is_nan() { stats.mean } else { v };
                        self.scale(v, stats)
                    })
                    .collect();

                let mut result = SparseVector::from_dense(&out);
                for (j, v) in x.iter().filter(|&(j, _)| j >= dim) {
                    result.indices.push(j);
                    result.values.push(v);
                }
                result
            }
        }
    }

    /// Transform every instance of `data` in place
    pub fn transform_instances(&self, data: &mut Instances) {
        for inst in data.instances_mut() {
            inst.features = self.transform(&inst.features);
        }
    }

    fn scale(&self, value: f64, stats: &FeatureStats) -> f64 {
        match self.filter {
            FilterType::Normalize => {
                let range = stats.max - stats.min;
                if range > 0.0 {
                    (value - stats.min) / range
                } else {
                    0.0
                }
            }
            FilterType::Standardize => {
                if stats.std > 0.0 {
                    (value - stats.mean) / stats.std
                } else {
                    0.0
                }
            }
            FilterType::None => value,
        }
    }
}
