//! Integration tests for the pairsvm library
//!
//! These tests exercise the solver, calibration and multiclass layers
//! together through the public API.

use approx::assert_relative_eq;
use pairsvm::api::{evaluate, SMO};
use pairsvm::kernel::{Kernel, KernelType, PolynomialKernel, RBFKernel};
use pairsvm::persistence::{load_from_file, save_to_file};
use pairsvm::{
    BinarySMO, CancellationToken, FilterType, Instance, Instances, LibSVMReader,
    LogisticCalibrator, MulticlassSMO, SMOConfig, SVMError, SparseVector,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use tempfile::NamedTempFile;

fn point(x: f64, y: f64) -> SparseVector {
    SparseVector::new(vec![0, 1], vec![x, y])
}

/// Two overlapping clouds, so some multipliers end up at the bound
fn overlapping_pair() -> Vec<Instance> {
    let mut data = Vec::new();
    for i in 0..12 {
        let t = i as f64 * 0.37;
        let jitter = (t * 3.1).sin();
        data.push(Instance::new(point(t.cos() + jitter * 0.8, t.sin()), 0));
        data.push(Instance::new(point(1.5 + t.sin(), 0.5 + t.cos() * jitter), 1));
    }
    data
}

fn three_clusters() -> Instances {
    let mut data = Instances::with_class_names(
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        2,
    );
    for i in 0..6 {
        let d = (i as f64 * 0.7).sin() * 0.4;
        data.push(Instance::new(point(d, -d), 0)).unwrap();
        data.push(Instance::new(point(4.0 + d, d), 1)).unwrap();
        data.push(Instance::new(point(d, 4.0 - d), 2)).unwrap();
    }
    data
}

/// Check the Keerthi optimality conditions on every training example
#[test]
fn test_binary_solution_satisfies_kkt() {
    let data = overlapping_pair();
    let config = SMOConfig {
        c: 2.0,
        ..SMOConfig::default()
    };
    let smo: BinarySMO<KernelType> = BinarySMO::train(
        &data,
        (0, 1),
        RBFKernel::new(1.0).into(),
        None,
        &config,
        &CancellationToken::new(),
    )
    .expect("Training should succeed");

    let mut alphas = vec![0.0; data.len()];
    for sv in smo.support_vectors() {
        alphas[sv.index] = sv.alpha;
    }
    assert!(!smo.support_vectors().is_empty());

    let slack = 2.0 * config.tol + 1e-6;
    let mut balance = 0.0;
    for (inst, &alpha) in data.iter().zip(&alphas) {
        let y = if inst.class_index == 0 { -1.0 } else { 1.0 };
        let margin = y * smo.output(&inst.features);
        let bound = config.c * inst.weight;
        balance += alpha * y;

        assert!((0.0..=bound).contains(&alpha), "alpha {} outside [0, {}]", alpha, bound);
        if alpha == 0.0 {
            assert!(margin >= 1.0 - slack, "alpha = 0 but margin {}", margin);
        } else if alpha == bound {
            assert!(margin <= 1.0 + slack, "alpha = C but margin {}", margin);
        } else {
            assert!((margin - 1.0).abs() <= slack, "free alpha with margin {}", margin);
        }
    }
    assert_relative_eq!(balance, 0.0, epsilon = 1e-9);
}

/// Plain dot product that does not report itself as linear
#[derive(Debug, Clone)]
struct DotProduct;

impl Kernel for DotProduct {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        x.dot(y)
    }

    fn describe(&self) -> String {
        "dot product".to_string()
    }
}

#[test]
fn test_linear_weights_match_kernel_expansion() {
    let data = overlapping_pair();
    let config = SMOConfig::default();
    let cancel = CancellationToken::new();

    let linear: BinarySMO<KernelType> =
        BinarySMO::train(&data, (0, 1), KernelType::Linear, None, &config, &cancel).unwrap();
    let degree_one: BinarySMO<KernelType> = BinarySMO::train(
        &data,
        (0, 1),
        PolynomialKernel::new(1, 1.0, 0.0).into(),
        None,
        &config,
        &cancel,
    )
    .unwrap();
    let expanded: BinarySMO<DotProduct> =
        BinarySMO::train(&data, (0, 1), DotProduct, None, &config, &cancel).unwrap();

    assert!(linear.weights().is_some());
    assert!(degree_one.weights().is_some());
    assert!(expanded.weights().is_none());
    for x in [point(0.3, -0.2), point(2.0, 1.0), point(-1.0, 4.0)] {
        assert_relative_eq!(linear.output(&x), degree_one.output(&x), epsilon = 1e-12);
        assert_relative_eq!(linear.output(&x), expanded.output(&x), epsilon = 1e-4);
    }
}

#[test]
fn test_separable_toy_problem_with_calibration() {
    let mut data = Instances::with_class_names(vec!["low".into(), "high".into()], 2);
    for d in [0.0, 0.5, 1.0] {
        data.push(Instance::new(point(d, d), 0)).unwrap();
        data.push(Instance::new(point(10.0 - d, 10.0 - d), 1)).unwrap();
    }

    let model = SMO::new()
        .with_filter(FilterType::None)
        .with_calibration(-1)
        .train(&data)
        .expect("Training should succeed");

    let near_low = model.distribution(&point(0.0, 0.0)).unwrap();
    let near_high = model.distribution(&point(10.0, 10.0)).unwrap();
    assert!(near_low[0] > 0.9, "p(low | (0,0)) = {}", near_low[0]);
    assert!(near_high[1] > 0.9, "p(high | (10,10)) = {}", near_high[1]);
    assert!(near_high[0] < 0.1);
    assert_relative_eq!(near_high.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    assert_eq!(model.classify(&point(9.0, 9.5)).unwrap(), 1);
}

/// 20 points per class around (0, 0) and (10, 10), unit Gaussian noise
fn noisy_clusters(seed: u64) -> Instances {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut gaussian = move || {
        // Box-Muller
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    };
    let mut data = Instances::with_class_names(vec!["a".into(), "b".into()], 2);
    for (class, centre) in [(0, 0.0), (1, 10.0)] {
        for _ in 0..20 {
            let x = point(centre + gaussian(), centre + gaussian());
            data.push(Instance::new(x, class)).unwrap();
        }
    }
    data
}

#[test]
fn test_separable_noisy_clusters() {
    let data = noisy_clusters(42);
    let model = SMO::new()
        .with_filter(FilterType::None)
        .with_c(1.0)
        .with_tol(1e-3)
        .with_calibration(-1)
        .train(&data)
        .expect("Training should succeed");

    assert_eq!(evaluate(&model, &data).unwrap().accuracy(), 1.0);
    assert!(model.distribution(&point(0.0, 0.0)).unwrap()[0] > 0.9);
    assert!(model.distribution(&point(10.0, 10.0)).unwrap()[0] < 0.1);

    // Same problem through the kernel expansion, so the support vectors are kept
    let config = SMOConfig {
        c: 1.0,
        tol: 1e-3,
        ..SMOConfig::default()
    };
    let smo: BinarySMO<DotProduct> = BinarySMO::train(
        data.instances(),
        (0, 1),
        DotProduct,
        None,
        &config,
        &CancellationToken::new(),
    )
    .unwrap();

    for inst in data.instances() {
        let y = if inst.class_index == 0 { -1.0 } else { 1.0 };
        assert!(y * smo.output(&inst.features) > 0.0, "misclassified training point");
    }

    let svs = smo.support_vectors();
    assert!(!svs.is_empty());
    let limit = 1.0 + 2.0 * config.tol + 1e-9;
    for sv in svs {
        let out = smo.output(&sv.features).abs();
        assert!(out <= limit, "support vector {} has |output| {}", sv.index, out);
    }

    // Points close to their cluster centre lie well outside the margin
    for (i, inst) in data.instances().iter().enumerate() {
        let centre = if inst.class_index == 0 { 0.0 } else { 10.0 };
        let dx = inst.features.get(0) - centre;
        let dy = inst.features.get(1) - centre;
        if (dx * dx + dy * dy).sqrt() < 1.0 {
            assert!(
                svs.iter().all(|sv| sv.index != i),
                "point {} near its centre is a support vector",
                i
            );
        }
    }
}

#[test]
fn test_votes_and_probabilities_agree_on_clusters() {
    let data = three_clusters();
    let voting = SMO::with_kernel(KernelType::from(RBFKernel::new(0.5)))
        .train(&data)
        .unwrap();
    let coupled = SMO::with_kernel(KernelType::from(RBFKernel::new(0.5)))
        .with_calibration(3)
        .train(&data)
        .unwrap();

    for inst in data.instances() {
        let votes = voting.distribution(&inst.features).unwrap();
        let probs = coupled.distribution(&inst.features).unwrap();
        assert_relative_eq!(votes.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(voting.classify(&inst.features).unwrap(), inst.class_index);
        assert_eq!(coupled.classify(&inst.features).unwrap(), inst.class_index);
    }
    assert_eq!(evaluate(&coupled, &data).unwrap().accuracy(), 1.0);
}

#[test]
fn test_training_is_deterministic() {
    let data = three_clusters();
    let train = |threads: usize| {
        SMO::with_kernel(KernelType::from(PolynomialKernel::new(2, 1.0, 1.0)))
            .with_calibration(2)
            .with_seed(7)
            .with_threads(threads)
            .train(&data)
            .unwrap()
    };

    let first = serde_json::to_string(&train(1)).unwrap();
    let second = serde_json::to_string(&train(1)).unwrap();
    let parallel = serde_json::to_string(&train(3)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, parallel);
}

#[test]
fn test_cancelled_build_returns_error() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = SMO::new().with_cancellation(cancel).train(&three_clusters());
    assert!(matches!(result, Err(SVMError::Cancelled)));
}

#[test]
fn test_zero_weight_instances() {
    let mut data = Instances::new(2, 2);
    data.push(Instance::weighted(point(0.0, 0.0), 0, 0.0)).unwrap();
    data.push(Instance::weighted(point(1.0, 1.0), 1, 0.0)).unwrap();
    assert!(matches!(
        SMO::new().train(&data),
        Err(SVMError::ZeroWeight)
    ));

    // Zero-weight instances are ignored, not trained on
    let mut data = three_clusters();
    data.push(Instance::weighted(point(0.0, 0.0), 1, 0.0)).unwrap();
    let model = SMO::new().train(&data).unwrap();
    assert_eq!(model.classify(&point(0.0, 0.0)).unwrap(), 0);
}

#[test]
fn test_missing_class_pair_is_constant() {
    let mut data = Instances::new(3, 2);
    for d in [0.0, 0.2, 0.4] {
        data.push(Instance::new(point(d, 0.0), 0)).unwrap();
        data.push(Instance::new(point(5.0 + d, 0.0), 2)).unwrap();
    }
    let model = MulticlassSMO::build(
        &data,
        KernelType::Linear,
        LogisticCalibrator::new(),
        SMOConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    assert!(model.pair(0, 1).unwrap().is_trivial());
    assert!(model.pair(1, 2).unwrap().is_trivial());
    assert!(!model.pair(0, 2).unwrap().is_trivial());
    assert_eq!(model.classify(&point(5.2, 0.0)).unwrap(), 2);
}

#[test]
fn test_libsvm_train_save_load_predict() {
    let mut train_file = NamedTempFile::new().expect("Failed to create temp file");
    for line in [
        "1 1:0.1 2:0.2",
        "1 1:0.3 2:0.1",
        "1 1:0.2 2:?",
        "2 1:3.0 2:3.1",
        "2 1:2.8 2:3.3",
        "2 1:3.2 2:2.9",
        "3 1:0.2 2:6.0",
        "3 1:0.1 2:5.8",
        "3 1:0.3 2:6.2",
    ] {
        writeln!(train_file, "{}", line).expect("Failed to write");
    }
    train_file.flush().expect("Failed to flush");

    let model = SMO::with_kernel(KernelType::from(RBFKernel::new(1.0)))
        .with_c(10.0)
        .with_calibration(-1)
        .train_from_file(train_file.path())
        .expect("Training should succeed");

    let model_file = NamedTempFile::new().expect("Failed to create temp file");
    save_to_file(&model, model_file.path()).expect("Save should succeed");
    let loaded = load_from_file(model_file.path()).expect("Load should succeed");

    let reader = LibSVMReader::from_file(train_file.path()).unwrap();
    let before = model.distributions(reader.features()).unwrap();
    let after = loaded.distributions(reader.features()).unwrap();
    assert_eq!(before, after);

    let data = reader.into_instances_with_classes(loaded.class_names()).unwrap();
    assert_eq!(evaluate(&loaded, &data).unwrap().accuracy(), 1.0);
}
