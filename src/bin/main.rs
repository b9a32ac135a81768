//! pairsvm Command Line Interface
//!
//! Train, evaluate and apply one-vs-one SMO models on LibSVM format data.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use pairsvm::api::{evaluate, SMO};
use pairsvm::core::{Dataset, FilterType, Result, SVMError};
use pairsvm::kernel::{KernelType, PolynomialKernel, RBFKernel};
use pairsvm::persistence::SerializableModel;
use pairsvm::{LibSVMReader, Prediction};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "pairsvm")]
#[command(about = "One-vs-one support vector classification trained with SMO")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new model
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Evaluate a model on labelled data
    Evaluate(EvaluateArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (LibSVM format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    /// Kernel function
    #[arg(short, long, default_value = "linear")]
    kernel: CliKernel,

    /// Kernel gamma (polynomial and rbf)
    #[arg(long, default_value = "1.0")]
    gamma: f64,

    /// Polynomial degree
    #[arg(long, default_value = "2")]
    degree: u32,

    /// Polynomial constant term
    #[arg(long, default_value = "1.0")]
    coef0: f64,

    /// Complexity constant C
    #[arg(short = 'C', long, default_value = "1.0")]
    c: f64,

    /// KKT tolerance
    #[arg(short, long, default_value = "0.001")]
    tol: f64,

    /// Round-off epsilon
    #[arg(short, long, default_value = "1e-12")]
    eps: f64,

    /// Fit calibrators for probability estimates
    #[arg(long)]
    calibrate: bool,

    /// Cross-validation folds for calibration (below 2 uses the training outputs)
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    folds: i32,

    /// Random seed for shuffling and fold assignment
    #[arg(short, long, default_value = "1")]
    seed: u64,

    /// Feature preprocessing
    #[arg(short, long, default_value = "normalize")]
    filter: CliFilter,

    /// Worker threads (1 = sequential, 0 = all cores)
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Kernel cache size in entries (0 disables caching)
    #[arg(long, default_value = "250007")]
    cache_size: usize,

    /// Stop each binary optimisation after this many passes
    #[arg(long)]
    max_passes: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernel {
    Linear,
    #[value(name = "poly")]
    Polynomial,
    Rbf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliFilter {
    /// Rescale features to [0, 1]
    Normalize,
    /// Zero mean, unit variance
    Standardize,
    /// Use features as given
    None,
}

impl From<CliFilter> for FilterType {
    fn from(filter: CliFilter) -> Self {
        match filter {
            CliFilter::Normalize => FilterType::Normalize,
            CliFilter::Standardize => FilterType::Standardize,
            CliFilter::None => FilterType::None,
        }
    }
}

impl TrainArgs {
    fn kernel(&self) -> Result<KernelType> {
        if matches!(self.kernel, CliKernel::Polynomial | CliKernel::Rbf)
            && (!self.gamma.is_finite() || self.gamma <= 0.0)
        {
            return Err(SVMError::InvalidParameter(format!(
                "gamma must be positive, got {}",
                self.gamma
            )));
        }
        Ok(match self.kernel {
            CliKernel::Linear => KernelType::Linear,
            CliKernel::Polynomial => {
                if self.degree == 0 {
                    return Err(SVMError::InvalidParameter(
                        "degree must be at least 1".to_string(),
                    ));
                }
                PolynomialKernel::new(self.degree, self.gamma, self.coef0).into()
            }
            CliKernel::Rbf => RBFKernel::new(self.gamma).into(),
        })
    }
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file (labels are ignored)
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the full class distribution
    #[arg(long)]
    probabilities: bool,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Test data file
    #[arg(long)]
    data: PathBuf,

    /// Show the confusion matrix and per-class metrics
    #[arg(long)]
    detailed: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,

    /// Print every pairwise classifier
    #[arg(long)]
    full: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Evaluate(args) => evaluate_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training SMO model...");
    info!("Data file: {:?}", args.data);

    let data = LibSVMReader::from_file(&args.data)?.into_instances()?;
    info!(
        "Loaded {} instances with {} features and {} classes",
        data.len(),
        data.dim(),
        data.num_classes()
    );

    let mut builder = SMO::with_kernel(args.kernel()?)
        .with_c(args.c)
        .with_tol(args.tol)
        .with_eps(args.eps)
        .with_seed(args.seed)
        .with_filter(args.filter.into())
        .with_threads(args.threads)
        .with_cache_size(args.cache_size);
    if args.calibrate {
        builder = builder.with_calibration(args.folds);
    }
    if let Some(max_passes) = args.max_passes {
        builder = builder.with_max_passes(max_passes);
    }

    let model = builder.train(&data)?;
    info!("Training completed successfully");
    info!("Support vectors: {}", model.total_support_vectors());

    let metrics = evaluate(&model, &data)?;
    info!("Training accuracy: {:.2}%", metrics.accuracy() * 100.0);

    let serializable = SerializableModel::from_model(model);
    serializable.save_to_file(&args.output)?;
    info!("Model saved to: {:?}", args.output);

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = SerializableModel::load_from_file(&args.model)?.into_model();

    info!("Loading prediction data from: {:?}", args.data);
    let reader = LibSVMReader::from_file(&args.data)?;
    let predictions: Vec<Prediction> = model
        .distributions(reader.features())?
        .into_iter()
        .map(Prediction::from_distribution)
        .collect();

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    writeln!(writer, "# Predictions for {} instances", predictions.len())?;
    writeln!(
        writer,
        "# Format: instance_index predicted_label{}",
        if args.probabilities {
            format!(" p({})", model.class_names().join(") p("))
        } else {
            String::new()
        }
    )?;

    for (i, pred) in predictions.iter().enumerate() {
        write!(writer, "{} {}", i, model.class_names()[pred.class_index])?;
        if args.probabilities {
            for p in &pred.distribution {
                write!(writer, " {:.6}", p)?;
            }
        }
        writeln!(writer)?;
    }
    writer.flush()?;

    if let Some(path) = &args.output {
        info!("Predictions saved to: {path:?}");
    }
    Ok(())
}

fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable_model = SerializableModel::load_from_file(&args.model)?;

    info!("Loading test data from: {:?}", args.data);
    let data = LibSVMReader::from_file(&args.data)?
        .into_instances_with_classes(serializable_model.model.class_names())?;
    let metrics = evaluate(&serializable_model.model, &data)?;

    println!("=== Model Evaluation ===");
    serializable_model.print_summary();

    println!("\nTest Results:");
    println!("  Instances: {}", metrics.total());
    println!("  Correct:   {}", metrics.correct());
    println!("  Accuracy:  {:.2}%", metrics.accuracy() * 100.0);

    let names = serializable_model.model.class_names();
    println!("\nPer-class Results:");
    for (class, name) in names.iter().enumerate() {
        println!(
            "  {:>8}: {} instances, {} correct",
            name,
            metrics.support(class),
            metrics.confusion[class][class]
        );
    }

    if args.detailed {
        println!("\nConfusion Matrix (rows = actual, columns = predicted):");
        println!("  {:>8} {}", "", names.iter().map(|n| format!("{:>8}", n)).collect::<String>());
        for (class, row) in metrics.confusion.iter().enumerate() {
            let cells: String = row.iter().map(|c| format!("{:>8}", c)).collect();
            println!("  {:>8} {}", names[class], cells);
        }

        println!("\nDetailed Metrics:");
        for (class, name) in names.iter().enumerate() {
            println!(
                "  {:>8}: precision {:.4}, recall {:.4}, F1 {:.4}",
                name,
                metrics.precision(class),
                metrics.recall(class),
                metrics.f1_score(class)
            );
        }
    }

    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable_model = SerializableModel::load_from_file(&args.model)?;

    serializable_model.print_summary();

    println!("\nPair Classifiers:");
    for pair in serializable_model.model.pairs() {
        let (i, j) = pair.classes();
        let names = serializable_model.model.class_names();
        let shape = match (pair.is_trivial(), pair.weights()) {
            (true, _) => "constant".to_string(),
            (false, Some(w)) => format!("{} weights", w.nnz()),
            (false, None) => format!("{} support vectors", pair.support_vectors().len()),
        };
        println!(
            "  {} vs {}: {}, b = {:.6}, {} kernel evaluations",
            names[i],
            names[j],
            shape,
            pair.threshold(),
            pair.kernel_stats().evaluations
        );
    }

    if args.full {
        println!("\n{}", serializable_model.model);
    }

    Ok(())
}
