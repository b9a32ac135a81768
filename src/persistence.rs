//! Model serialization and persistence
//!
//! Trained models are stored as pretty-printed JSON together with a small
//! metadata header, for use with the CLI application and anywhere else a
//! model has to outlive the process that trained it.

use crate::calibration::LogisticCalibrator;
use crate::core::{Result, SVMError};
use crate::kernel::{Kernel, KernelType};
use crate::multiclass::MulticlassSMO;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Model type the CLI trains and the persistence layer stores
pub type StoredModel = MulticlassSMO<KernelType, LogisticCalibrator>;

/// Serializable representation of a trained multiclass model
#[derive(Serialize, Deserialize)]
pub struct SerializableModel {
    /// Model metadata
    pub metadata: ModelMetadata,
    /// Kernel, configuration, preprocessing state and every pair model
    pub model: StoredModel,
}

/// Model metadata for tracking and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    pub kernel: String,
    pub num_classes: usize,
    pub num_pairs: usize,
    /// Support vectors summed over all pairs (0 for linear models)
    pub total_support_vectors: usize,
    /// Training parameters used
    pub training_params: TrainingParams,
    /// Creation timestamp
    pub created_at: String,
}

/// Training parameters for reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingParams {
    pub c: f64,
    pub tol: f64,
    pub eps: f64,
    pub build_calibration: bool,
    pub num_folds: i32,
    pub seed: u64,
}

impl SerializableModel {
    /// Wrap a trained model, stamping it with the library version and time
    pub fn from_model(model: StoredModel) -> Self {
        let config = model.config();
        let metadata = ModelMetadata {
            library_version: env!("CARGO_PKG_VERSION").to_string(),
            kernel: model.kernel().describe(),
            num_classes: model.num_classes(),
            num_pairs: model.pairs().len(),
            total_support_vectors: model.total_support_vectors(),
            training_params: TrainingParams {
                c: config.c,
                tol: config.tol,
                eps: config.eps,
                build_calibration: config.build_calibration,
                num_folds: config.num_folds,
                seed: config.seed,
            },
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        Self { metadata, model }
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(SVMError::IoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| SVMError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        let reader = BufReader::new(file);
        let stored: Self = serde_json::from_reader(reader)
            .map_err(|e| SVMError::SerializationError(e.to_string()))?;
        stored.validate()?;
        Ok(stored)
    }

    /// Check that the stored model is complete
    fn validate(&self) -> Result<()> {
        let k = self.model.num_classes();
        let expected = k * k.saturating_sub(1) / 2;
        if self.model.pairs().len() != expected {
            return Err(SVMError::SerializationError(format!(
                "model has {} pair classifiers, expected {} for {} classes",
                self.model.pairs().len(),
                expected,
                k
            )));
        }

        let expected_pairs = (0..k).flat_map(|i| ((i + 1)..k).map(move |j| (i, j)));
        let pairs = self.model.pairs().iter().zip(expected_pairs);
        for (position, (pair, expected)) in pairs.enumerate() {
            if pair.classes() != expected {
                return Err(SVMError::SerializationError(format!(
                    "pair classifier {} is for classes {:?}, expected {:?}",
                    position,
                    pair.classes(),
                    expected
                )));
            }
        }
        Ok(())
    }

    pub fn into_model(self) -> StoredModel {
        self.model
    }

    /// Print model summary
    pub fn print_summary(&self) {
        let meta = &self.metadata;
        println!("=== SMO Model Summary ===");
        println!("Kernel: {}", meta.kernel);
        println!("Classes: {} ({})", meta.num_classes, self.model.class_names().join(", "));
        println!("Pair Classifiers: {}", meta.num_pairs);
        println!("Support Vectors: {}", meta.total_support_vectors);
        println!("Library Version: {}", meta.library_version);
        println!("Created: {}", meta.created_at);
        println!("Training Parameters:");
        println!("  C: {}", meta.training_params.c);
        println!("  Tolerance: {}", meta.training_params.tol);
        println!("  Epsilon: {}", meta.training_params.eps);
        println!("  Calibration: {}", meta.training_params.build_calibration);
        if meta.training_params.build_calibration {
            println!("  Folds: {}", meta.training_params.num_folds);
        }
        println!("  Seed: {}", meta.training_params.seed);
    }
}

/// Save a trained model as JSON
pub fn save_to_file<P: AsRef<Path>>(model: &StoredModel, path: P) -> Result<()> {
    SerializableModel::from_model(model.clone()).save_to_file(path)
}

/// Load a model written by [`save_to_file`]
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<StoredModel> {
    SerializableModel::load_from_file(path).map(SerializableModel::into_model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CancellationToken, Instance, Instances, SMOConfig, SparseVector};
    use crate::kernel::RBFKernel;
    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;

    fn dataset() -> Instances {
        let mut data = Instances::new(3, 2);
        for i in 0..4 {
            let d = i as f64 * 0.3;
            data.push(Instance::new(SparseVector::new(vec![0, 1], vec![d, d]), 0))
                .unwrap();
            data.push(Instance::new(SparseVector::new(vec![0, 1], vec![5.0 + d, d]), 1))
                .unwrap();
            data.push(Instance::new(SparseVector::new(vec![0, 1], vec![d, 5.0 + d]), 2))
                .unwrap();
        }
        data
    }

    fn train(kernel: KernelType, build_calibration: bool) -> StoredModel {
        MulticlassSMO::build(
            &dataset(),
            kernel,
            LogisticCalibrator::new(),
            SMOConfig {
                build_calibration,
                ..SMOConfig::default()
            },
            &CancellationToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_model_serialization() -> Result<()> {
        let model = train(RBFKernel::new(1.0).into(), true);

        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        save_to_file(&model, temp_file.path())?;
        let loaded = load_from_file(temp_file.path())?;

        assert_eq!(loaded.kernel(), model.kernel());
        assert_eq!(loaded.class_names(), model.class_names());
        assert_eq!(loaded.pairs().len(), 3);

        for x in [
            SparseVector::new(vec![0, 1], vec![0.5, 0.2]),
            SparseVector::new(vec![0, 1], vec![5.5, 0.1]),
            SparseVector::new(vec![0], vec![2.0]),
        ] {
            let before = model.distribution(&x)?;
            let after = loaded.distribution(&x)?;
            for (a, b) in before.iter().zip(&after) {
                assert_relative_eq!(a, b, epsilon = 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn test_metadata() {
        let stored = SerializableModel::from_model(train(KernelType::Linear, false));
        assert_eq!(stored.metadata.kernel, "linear");
        assert_eq!(stored.metadata.num_classes, 3);
        assert_eq!(stored.metadata.num_pairs, 3);
        assert_eq!(stored.metadata.total_support_vectors, 0);
        assert!(!stored.metadata.training_params.build_calibration);
    }

    #[test]
    fn test_load_rejects_out_of_order_pairs() {
        let stored = SerializableModel::from_model(train(KernelType::Linear, false));
        let mut value = serde_json::to_value(&stored).expect("model serializes");

        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        for classes in [serde_json::json!([0, 7]), serde_json::json!([1, 2])] {
            value["model"]["pairs"][0]["classes"] = classes;
            std::fs::write(temp_file.path(), value.to_string()).expect("Failed to write");

            match load_from_file(temp_file.path()) {
                Err(SVMError::SerializationError(msg)) => assert!(msg.contains("pair classifier 0")),
                other => panic!("expected a serialization error, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_load_rejects_garbage() {
        use std::io::Write;

        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        write!(temp_file, "{{\"metadata\": 1}}").expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        assert!(matches!(
            load_from_file(temp_file.path()),
            Err(SVMError::SerializationError(_))
        ));
        assert!(matches!(
            load_from_file("/non/existent/model.json"),
            Err(SVMError::IoError(_))
        ));
    }
}
