//! LibSVM format reader
//!
//! Supports files in the libsvm format:
//! label index:value index:value ...
//!
//! Example:
//! 3 1:0.5 3:1.2 7:0.8
//! 1 2:0.3 5:2.1
//!
//! Labels may be any numbers. They are mapped to class indices in ascending
//! label order, so labels {3, 1, 2} become classes {2, 0, 1}. A value of `?`
//! marks a missing feature and is read as NaN.

use crate::core::{Instance, Instances, Result, SVMError, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parsed contents of a LibSVM file: raw labels and feature vectors
#[derive(Debug, Clone)]
pub struct LibSVMReader {
    labels: Vec<f64>,
    features: Vec<SparseVector>,
    dimensions: usize,
}

impl LibSVMReader {
    /// Load a LibSVM format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load from a reader (for testing and flexibility)
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut labels = Vec::new();
        let mut features = Vec::new();
        let mut dimensions = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(SVMError::IoError)?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (label, x) = Self::parse_line(line).map_err(|e| {
                SVMError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            dimensions = dimensions.max(x.extent());
            labels.push(label);
            features.push(x);
        }

        if labels.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        Ok(Self {
            labels,
            features,
            dimensions,
        })
    }

    /// Parse a single line in libsvm format
    fn parse_line(line: &str) -> Result<(f64, SparseVector)> {
        let mut parts = line.split_whitespace();

        let label_str = parts
            .next()
            .ok_or_else(|| SVMError::ParseError("Empty line".to_string()))?;
        let label = label_str
            .parse::<f64>()
            .ok()
            .filter(|l| l.is_finite())
            .ok_or_else(|| SVMError::ParseError(format!("Invalid label: {}", label_str)))?;

        let mut indices = Vec::new();
        let mut values = Vec::new();

        for feature_str in parts {
            let (index_str, value_str) = feature_str.split_once(':').ok_or_else(|| {
                SVMError::ParseError(format!("Invalid feature format: {}", feature_str))
            })?;

            let index = index_str.parse::<usize>().map_err(|_| {
                SVMError::ParseError(format!("Invalid feature index: {}", index_str))
            })?;
            // libsvm uses 1-based indexing
            if index == 0 {
                return Err(SVMError::ParseError(
                    "Feature index must be positive: 0".to_string(),
                ));
            }

            let value = if value_str == "?" {
                f64::NAN
            } else {
                value_str.parse::<f64>().map_err(|_| {
                    SVMError::ParseError(format!("Invalid feature value: {}", value_str))
                })?
            };

            indices.push(index - 1);
            values.push(value);
        }

        Ok((label, SparseVector::new(indices, values)))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// One past the largest feature index seen
    pub fn dim(&self) -> usize {
        self.dimensions
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn features(&self) -> &[SparseVector] {
        &self.features
    }

    /// Distinct labels in ascending order, formatted as class names
    pub fn class_names(&self) -> Vec<String> {
        let mut distinct = self.labels.clone();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        distinct.into_iter().map(format_label).collect()
    }

    /// Build a training set whose classes are this file's distinct labels
    pub fn into_instances(self) -> Result<Instances> {
        let class_names = self.class_names();
        self.into_instances_with_classes(&class_names)
    }

    /// Build a data set against an existing class mapping (e.g. a saved model's)
    ///
    /// Fails if a label is not among `class_names`.
    pub fn into_instances_with_classes(self, class_names: &[String]) -> Result<Instances> {
        let mut instances = Instances::with_class_names(class_names.to_vec(), self.dimensions);
        for (label, features) in self.labels.into_iter().zip(self.features) {
            let class_index = class_index_of(label, class_names).ok_or_else(|| {
                SVMError::InvalidDataset(format!("label {} is not a known class", label))
            })?;
            instances.push(Instance::new(features, class_index))?;
        }
        Ok(instances)
    }
}

/// Class index of a numeric label within `class_names`
pub fn class_index_of(label: f64, class_names: &[String]) -> Option<usize> {
    class_names
        .iter()
        .position(|name| name.parse::<f64>().ok() == Some(label))
}

fn format_label(label: f64) -> String {
    if label == 0.0 {
        // Avoid "-0"
        "0".to_string()
    } else {
        format!("{}", label)
    }
}
