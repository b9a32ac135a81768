//! Training and prediction benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pairsvm::kernel::{KernelType, RBFKernel};
use pairsvm::{
    BinarySMO, CancellationToken, Instance, Instances, LogisticCalibrator, MulticlassSMO,
    SMOConfig, SparseVector,
};

/// Deterministic noisy clusters, one per class, around the corners of a grid
fn clusters(num_classes: usize, per_class: usize) -> Instances {
    let mut data = Instances::new(num_classes, 4);
    for class in 0..num_classes {
        let cx = (class % 2) as f64 * 3.0;
        let cy = (class / 2) as f64 * 3.0;
        for i in 0..per_class {
            let t = (i * 7 + class * 13) as f64;
            let x = SparseVector::new(
                vec![0, 1, 2, 3],
                vec![cx + t.sin() * 1.2, cy + t.cos() * 1.2, (t * 0.3).sin(), (t * 0.7).cos()],
            );
            data.push(Instance::new(x, class)).expect("valid instance");
        }
    }
    data
}

fn bench_binary(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_smo");
    let cancel = CancellationToken::new();

    for size in [100, 400] {
        let data = clusters(2, size / 2);
        let config = SMOConfig::default();

        group.bench_with_input(BenchmarkId::new("linear", size), &data, |b, data| {
            b.iter(|| {
                BinarySMO::<KernelType, LogisticCalibrator>::train(
                    black_box(data.instances()),
                    (0, 1),
                    KernelType::Linear,
                    None,
                    &config,
                    &cancel,
                )
                .expect("training succeeds")
            })
        });

        group.bench_with_input(BenchmarkId::new("rbf", size), &data, |b, data| {
            b.iter(|| {
                BinarySMO::<KernelType, LogisticCalibrator>::train(
                    black_box(data.instances()),
                    (0, 1),
                    RBFKernel::new(0.5).into(),
                    None,
                    &config,
                    &cancel,
                )
                .expect("training succeeds")
            })
        });
    }
    group.finish();
}

fn bench_multiclass(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiclass_smo");
    group.sample_size(20);
    let cancel = CancellationToken::new();
    let data = clusters(4, 60);

    for (name, config) in [
        ("voting", SMOConfig::default()),
        (
            "calibrated_3_folds",
            SMOConfig {
                build_calibration: true,
                num_folds: 3,
                ..SMOConfig::default()
            },
        ),
        (
            "voting_parallel",
            SMOConfig {
                num_threads: 0,
                ..SMOConfig::default()
            },
        ),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                MulticlassSMO::build(
                    black_box(&data),
                    KernelType::from(RBFKernel::new(0.5)),
                    LogisticCalibrator::new(),
                    config.clone(),
                    &cancel,
                )
                .expect("training succeeds")
            })
        });
    }

    let model = MulticlassSMO::build(
        &data,
        KernelType::from(RBFKernel::new(0.5)),
        LogisticCalibrator::new(),
        SMOConfig {
            build_calibration: true,
            ..SMOConfig::default()
        },
        &cancel,
    )
    .expect("training succeeds");
    let inputs: Vec<SparseVector> = data.instances().iter().map(|i| i.features.clone()).collect();
    group.bench_function("coupled_prediction", |b| {
        b.iter(|| model.distributions(black_box(&inputs)).expect("prediction succeeds"))
    });

    group.finish();
}

criterion_group!(benches, bench_binary, bench_multiclass);
criterion_main!(benches);
