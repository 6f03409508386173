//! smorch command line interface
//!
//! Train, evaluate and apply SMO models on LibSVM and CSV data.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info, warn};
use smorch::api::{Smorch, TrainedModel};
use smorch::core::{Heuristics, Mode, Result, SmoConfig, TrainingStatus};
use smorch::data::{CsvOptions, DenseDataset};
use smorch::persistence::{load_model, save_model, ModelFormat, SerializableModel};
use smorch::{Dataset, Kernel};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "smorch")]
#[command(about = "Support vector machines trained by sequential minimal optimization")]
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
    /// Evaluate a model on test data
    Evaluate(EvaluateArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DataFormat {
    /// Decide from the file extension
    Auto,
    Libsvm,
    Csv,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernel {
    /// x·y
    Linear,
    /// exp(-|x-y|² / 2σ²), σ = aux
    Gaussian,
    /// (x·y + 1)^aux
    Polynomial,
    /// tanh(x·y - aux)
    Tanh,
    /// (1 + |x-y|²/aux)^(-d/2)
    Coulomb,
}

impl From<CliKernel> for Kernel {
    fn from(kernel: CliKernel) -> Self {
        match kernel {
            CliKernel::Linear => Kernel::Linear,
            CliKernel::Gaussian => Kernel::Gaussian,
            CliKernel::Polynomial => Kernel::Polynomial,
            CliKernel::Tanh => Kernel::Tanh,
            CliKernel::Coulomb => Kernel::Coulomb,
        }
    }
}

#[derive(Args)]
struct DataArgs {
    /// Data file (LibSVM or CSV format)
    #[arg(long)]
    data: PathBuf,

    /// Data format
    #[arg(short, long, value_enum, default_value_t = DataFormat::Auto)]
    format: DataFormat,

    /// Number of trailing CSV columns holding targets
    #[arg(long, default_value_t = 1)]
    target_columns: usize,

    /// Target column used for training and scoring
    #[arg(long, default_value_t = 0)]
    target_index: usize,
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    input: DataArgs,

    /// Output model file (`.json` for JSON, anything else for text)
    #[arg(short, long)]
    output: PathBuf,

    /// Kernel function
    #[arg(short, long, value_enum, default_value_t = CliKernel::Linear)]
    kernel: CliKernel,

    /// Kernel parameter
    #[arg(short, long, default_value_t = 1.0)]
    aux: f64,

    /// Box constraint C
    #[arg(short = 'C', long, default_value_t = 1.0)]
    c: f64,

    /// KKT tolerance
    #[arg(short, long, default_value_t = 1e-3)]
    tol: f64,

    /// Numerical noise floor
    #[arg(long, default_value_t = 1e-10)]
    eps: f64,

    /// Kernel cache capacity in exemplars
    #[arg(long, default_value_t = 1000)]
    cache_size: usize,

    /// Active subset size for problems larger than the cache
    #[arg(long)]
    subset_size: Option<usize>,

    /// Train a regressor instead of a classifier
    #[arg(short, long)]
    regression: bool,

    /// Tube width for regression
    #[arg(long, default_value_t = 0.1)]
    regeps: f64,

    /// Pick the partner with the largest objective decrease
    #[arg(long)]
    best_step: bool,

    /// Examine the worst violators first
    #[arg(long)]
    worst_first: bool,

    /// Only scan the whole set during examine-all sweeps
    #[arg(long)]
    lazy_loop: bool,

    /// Always rebuild stale outputs by full resummation
    #[arg(long)]
    no_ultra_clever: bool,

    /// Maximum number of examined candidates
    #[arg(short, long)]
    max_iterations: Option<usize>,

    /// Seed for randomized scan order
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    #[command(flatten)]
    input: DataArgs,

    /// Output predictions file (prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show decision values
    #[arg(long)]
    confidence: bool,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    #[command(flatten)]
    input: DataArgs,

    /// Show detailed metrics
    #[arg(long)]
    detailed: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

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
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn train_command(args: TrainArgs) -> Result<()> {
    let dataset = load_dataset(&args.input, None)?;
    info!(
        "Loaded {} exemplars with {} features from {:?}",
        dataset.len(),
        dataset.x_dim(),
        args.input.data
    );

    let mut builder = Smorch::new()
        .with_kernel(args.kernel.into())
        .with_aux(args.aux)
        .with_c(args.c)
        .with_tolerance(args.tol)
        .with_eps(args.eps)
        .with_cache_size(args.cache_size)
        .with_target_index(args.input.target_index)
        .with_seed(args.seed)
        .with_heuristics(Heuristics {
            ultra_clever: !args.no_ultra_clever,
            best_step: args.best_step,
            worst_first: args.worst_first,
            lazy_loop: args.lazy_loop,
        })
        .with_progress_hook(|report| {
            info!(
                "epoch {} ({}): {} steps, objective {:.6}, {} support vectors, cache hit rate {:.3}",
                report.epoch,
                if report.examine_all { "all" } else { "non-bound" },
                report.num_changed,
                report.objective,
                report.n_nonzero,
                report.cache.hit_rate()
            )
        });
    if args.regression {
        builder = builder.with_regression(args.regeps);
    }
    if let Some(subset_size) = args.subset_size {
        builder = builder.with_subset_size(subset_size);
    }
    if let Some(max_iterations) = args.max_iterations {
        builder = builder.with_max_iterations(max_iterations);
    }

    let model = builder.train(&dataset)?;
    if let Some(summary) = model.summary() {
        match summary.status {
            TrainingStatus::Converged => info!(
                "Converged after {} epochs and {} steps",
                summary.epochs, summary.steps
            ),
            status => warn!("Training stopped early: {:?}", status),
        }
    }

    let info = model.info();
    info!("Support vectors: {}", info.n_support_vectors);
    info!("Bias: {:.6}", info.bias);

    save_model(&model, &args.output)?;
    info!("Model saved to: {:?}", args.output);

    report_training_fit(&model, &dataset)
}

fn report_training_fit(model: &TrainedModel, dataset: &DenseDataset) -> Result<()> {
    match model.inner().mode() {
        Mode::Classification => {
            info!("Training accuracy: {:.2}%", model.evaluate(dataset)? * 100.0)
        }
        Mode::Regression => info!("Training MSE: {:.6}", model.evaluate(dataset)?),
    }
    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = load_model(&args.model)?;
    let dataset = load_dataset(&args.input, Some(&model))?;

    info!(
        "Predicting {} exemplars with {} support vectors",
        dataset.len(),
        model.info().n_support_vectors
    );
    let predictions = model.predict_dataset(&dataset)?;

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    writeln!(writer, "# Predictions for {} samples", predictions.len())?;
    writeln!(
        writer,
        "# Format: sample_index prediction{}",
        if args.confidence { " decision_value" } else { "" }
    )?;
    let regression = model.inner().mode() == Mode::Regression;
    for (i, pred) in predictions.iter().enumerate() {
        let label = if regression {
            format!("{:.6}", pred.label)
        } else {
            format!("{:.0}", pred.label)
        };
        if args.confidence {
            writeln!(writer, "{} {} {:.6}", i, label, pred.decision_value)?;
        } else {
            writeln!(writer, "{} {}", i, label)?;
        }
    }
    writer.flush()?;

    if let Some(path) = args.output {
        info!("Predictions saved to: {path:?}");
    }
    Ok(())
}

fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = load_model(&args.model)?;
    let dataset = load_dataset(&args.input, Some(&model))?;
    let model = TrainedModel::new(
        model.inner().clone(),
        SmoConfig {
            target_index: args.input.target_index,
            ..model.config().clone()
        },
        None,
    );

    println!("=== Model Evaluation ===");
    print_info(&model);

    println!("\nTest Results:");
    match model.inner().mode() {
        Mode::Classification => {
            let metrics = model.evaluate_detailed(&dataset)?;
            println!("  Accuracy: {:.2}%", metrics.accuracy() * 100.0);
            if args.detailed {
                println!("\nDetailed Metrics:");
                println!("  True Positives:  {}", metrics.true_positives);
                println!("  True Negatives:  {}", metrics.true_negatives);
                println!("  False Positives: {}", metrics.false_positives);
                println!("  False Negatives: {}", metrics.false_negatives);
                println!("  Precision:       {:.4}", metrics.precision());
                println!("  Recall:          {:.4}", metrics.recall());
                println!("  F1 Score:        {:.4}", metrics.f1_score());
                println!("  Specificity:     {:.4}", metrics.specificity());
            }
        }
        Mode::Regression => {
            let metrics = model.evaluate_regression(&dataset)?;
            println!("  MSE: {:.6}", metrics.mse);
            if args.detailed {
                println!("\nDetailed Metrics:");
                println!("  RMSE:      {:.6}", metrics.rmse());
                println!("  MAE:       {:.6}", metrics.mae);
                println!("  Max Error: {:.6}", metrics.max_error);
            }
        }
    }
    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    if ModelFormat::from_path(&args.model) == ModelFormat::Json {
        SerializableModel::load_from_file(&args.model)?.print_summary();
    }
    let model = load_model(&args.model)?;
    print_info(&model);

    let svs = model.inner().support_vectors();
    let n_show = svs.len().min(10);
    println!("\nSupport Vectors (alpha, y):");
    for (i, sv) in svs.iter().enumerate().take(n_show) {
        println!("  #{i}: {:.6} {:+}", sv.alpha, sv.y);
    }
    if svs.len() > n_show {
        println!("  ... ({} more)", svs.len() - n_show);
    }
    Ok(())
}

fn print_info(model: &TrainedModel) {
    let info = model.info();
    println!("Mode: {:?}", info.mode);
    println!("Kernel: {} (aux = {})", info.kernel, info.aux);
    println!("Input dimension: {}", info.x_dim);
    println!(
        "Support vectors: {} ({} at bound)",
        info.n_support_vectors, info.n_bound_support_vectors
    );
    println!("Bias: {:.6}", info.bias);
}

/// Load a dataset. With a model, LibSVM rows are padded to its input width.
fn load_dataset(args: &DataArgs, model: Option<&TrainedModel>) -> Result<DenseDataset> {
    let format = match args.format {
        DataFormat::Auto => detect_format(&args.data),
        explicit => explicit,
    };
    info!("Loading {:?} as {:?}", args.data, format);

    match format {
        DataFormat::Csv => DenseDataset::from_csv_file_with_options(
            &args.data,
            CsvOptions {
                target_columns: args.target_columns,
                ..CsvOptions::default()
            },
        ),
        _ => match model {
            Some(model) => model.load_libsvm(&args.data),
            None => DenseDataset::from_libsvm_file(&args.data),
        },
    }
}

fn detect_format(path: &Path) -> DataFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => DataFormat::Csv,
        Some("libsvm") | Some("svm") => DataFormat::Libsvm,
        Some(_) => {
            warn!("Unknown file extension, assuming LibSVM format");
            DataFormat::Libsvm
        }
        None => {
            warn!("No file extension, assuming LibSVM format");
            DataFormat::Libsvm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(detect_format(&PathBuf::from("test.csv")), DataFormat::Csv);
        assert_eq!(detect_format(&PathBuf::from("test.libsvm")), DataFormat::Libsvm);
        assert_eq!(detect_format(&PathBuf::from("test.svm")), DataFormat::Libsvm);
        assert_eq!(detect_format(&PathBuf::from("test")), DataFormat::Libsvm);
    }

    #[test]
    fn test_cli_parses_train_options() {
        let cli = Cli::try_parse_from([
            "smorch", "train", "--data", "d.svm", "-o", "m.json", "-k", "gaussian", "-a", "0.5",
            "-C", "10", "--regression", "--best-step",
        ])
        .unwrap();
        match cli.command {
            Commands::Train(args) => {
                assert!(matches!(args.kernel, CliKernel::Gaussian));
                assert_eq!(args.aux, 0.5);
                assert_eq!(args.c, 10.0);
                assert!(args.regression);
                assert!(args.best_step);
                assert!(!args.lazy_loop);
            }
            _ => panic!("expected train command"),
        }
    }
}
