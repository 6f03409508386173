//! Model serialization and persistence
//!
//! Two formats are supported:
//!
//! * text: one header line `x_dim n_sv bias aux kernel mode`, then one line
//!   per support vector `alpha y x_1 ... x_d`
//! * JSON: `SerializableModel`, which also records the training parameters
//!   and a creation timestamp
//!
//! Models with a custom kernel cannot be written in either format.

use crate::api::TrainedModel;
use crate::core::{Mode, Model, Result, SmoConfig, SmoError};
use crate::kernel::Kernel;
use crate::optimizer::{SupportVector, Svm};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// On-disk model format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Text,
    Json,
}

impl ModelFormat {
    /// `.json` files are JSON, anything else is text
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ModelFormat::Json,
            _ => ModelFormat::Text,
        }
    }
}

/// Serializable representation of a trained model
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableModel {
    pub x_dim: usize,
    pub bias: f64,
    /// Kernel name as accepted by `Kernel::from_name`
    pub kernel: String,
    pub aux: f64,
    pub mode: Mode,
    pub support_vectors: Vec<SerializableSupportVector>,
    pub metadata: ModelMetadata,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SerializableSupportVector {
    pub alpha: f64,
    pub y: f64,
    pub x: Vec<f64>,
}

/// Model metadata for tracking and validation
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    pub n_support_vectors: usize,
    pub training_params: TrainingParams,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

/// Training parameters for reference
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingParams {
    pub c: f64,
    pub tol: f64,
    pub eps: f64,
    pub regeps: f64,
    pub cache_size: usize,
    pub target_index: usize,
    pub seed: u64,
}

impl From<&SupportVector> for SerializableSupportVector {
    fn from(sv: &SupportVector) -> Self {
        Self {
            alpha: sv.alpha,
            y: sv.y,
            x: sv.x.clone(),
        }
    }
}

impl From<&SerializableSupportVector> for SupportVector {
    fn from(s: &SerializableSupportVector) -> Self {
        SupportVector {
            alpha: s.alpha,
            y: s.y,
            x: s.x.clone(),
        }
    }
}

impl SerializableModel {
    /// Create a serializable model from a trained model
    pub fn from_trained_model(model: &TrainedModel) -> Result<Self> {
        let svm = model.inner();
        let config = model.config();
        ensure_builtin(svm.kernel())?;

        Ok(Self {
            x_dim: svm.x_dim(),
            bias: svm.bias(),
            kernel: svm.kernel().name().to_string(),
            aux: svm.aux(),
            mode: svm.mode(),
            support_vectors: svm
                .support_vectors()
                .iter()
                .map(SerializableSupportVector::from)
                .collect(),
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                n_support_vectors: svm.n_support_vectors(),
                training_params: TrainingParams {
                    c: config.c,
                    tol: config.tol,
                    eps: config.eps,
                    regeps: config.regeps,
                    cache_size: config.cache_size,
                    target_index: config.target_index,
                    seed: config.seed,
                },
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        })
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| SmoError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let model = serde_json::from_reader(reader)
            .map_err(|e| SmoError::SerializationError(e.to_string()))?;
        Ok(model)
    }

    /// Rebuild the trained model
    pub fn to_trained_model(&self) -> Result<TrainedModel> {
        let kernel = Kernel::from_name(&self.kernel)?;
        let svm = Svm::new(
            self.x_dim,
            self.bias,
            kernel.clone(),
            self.aux,
            self.mode,
            self.support_vectors.iter().map(SupportVector::from).collect(),
        )?;
        let params = &self.metadata.training_params;
        let config = SmoConfig {
            kernel,
            aux: self.aux,
            c: params.c,
            tol: params.tol,
            eps: params.eps,
            regression: self.mode == Mode::Regression,
            regeps: params.regeps,
            cache_size: params.cache_size,
            target_index: params.target_index,
            seed: params.seed,
            ..SmoConfig::default()
        };
        Ok(TrainedModel::new(svm, config, None))
    }

    /// Print model summary
    pub fn print_summary(&self) {
        println!("=== SMO Model Summary ===");
        println!("Mode: {:?}", self.mode);
        println!("Kernel: {} (aux = {})", self.kernel, self.aux);
        println!("Input dimension: {}", self.x_dim);
        println!("Support Vectors: {}", self.metadata.n_support_vectors);
        println!("Bias: {:.6}", self.bias);
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
        println!("Training Parameters:");
        println!("  C: {}", self.metadata.training_params.c);
        println!("  Tolerance: {}", self.metadata.training_params.tol);
        if self.mode == Mode::Regression {
            println!("  Regression epsilon: {}", self.metadata.training_params.regeps);
        }
    }
}

fn ensure_builtin(kernel: &Kernel) -> Result<()> {
    if kernel.is_builtin() {
        Ok(())
    } else {
        Err(SmoError::UnsupportedKernel(kernel.name().to_string()))
    }
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Classification => "classification",
        Mode::Regression => "regression",
    }
}

/// Write `model` in the text format
pub fn write_text<W: Write>(model: &Svm, mut writer: W) -> Result<()> {
    ensure_builtin(model.kernel())?;
    writeln!(
        writer,
        "{} {} {:e} {:e} {} {}",
        model.x_dim(),
        model.n_support_vectors(),
        model.bias(),
        model.aux(),
        model.kernel().name(),
        mode_name(model.mode())
    )?;
    for sv in model.support_vectors() {
        write!(writer, "{:e} {:e}", sv.alpha, sv.y)?;
        for v in &sv.x {
            write!(writer, " {:e}", v)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a model in the text format
pub fn read_text<R: BufRead>(reader: R) -> Result<Svm> {
    let mut lines = reader.lines();
    let header = lines
        .next()
        .ok_or_else(|| SmoError::ParseError("missing model header".to_string()))??;
    let fields: Vec<&str> = header.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(SmoError::ParseError(format!(
            "model header needs 6 fields, found {}",
            fields.len()
        )));
    }

    let x_dim = parse_field::<usize>(fields[0], "dimension")?;
    let n_sv = parse_field::<usize>(fields[1], "support vector count")?;
    let bias = parse_field::<f64>(fields[2], "bias")?;
    let aux = parse_field::<f64>(fields[3], "kernel parameter")?;
    let kernel = Kernel::from_name(fields[4])?;
    let mode = match fields[5] {
        "classification" => Mode::Classification,
        "regression" => Mode::Regression,
        other => return Err(SmoError::ParseError(format!("unknown mode: {}", other))),
    };

    let mut support_vectors = Vec::with_capacity(n_sv);
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(|v| parse_field::<f64>(v, "support vector value"))
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != x_dim + 2 {
            return Err(SmoError::DimensionMismatch {
                expected: x_dim + 2,
                actual: values.len(),
            });
        }
        support_vectors.push(SupportVector {
            alpha: values[0],
            y: values[1],
            x: values[2..].to_vec(),
        });
    }
    if support_vectors.len() != n_sv {
        return Err(SmoError::ParseError(format!(
            "header announces {} support vectors, found {}",
            n_sv,
            support_vectors.len()
        )));
    }

    Svm::new(x_dim, bias, kernel, aux, mode, support_vectors)
}

fn parse_field<T: std::str::FromStr>(field: &str, what: &str) -> Result<T> {
    field
        .parse::<T>()
        .map_err(|_| SmoError::ParseError(format!("invalid {}: {}", what, field)))
}

/// Save a trained model, choosing the format from the file extension
pub fn save_model<P: AsRef<Path>>(model: &TrainedModel, path: P) -> Result<()> {
    match ModelFormat::from_path(&path) {
        ModelFormat::Json => SerializableModel::from_trained_model(model)?.save_to_file(path),
        ModelFormat::Text => write_text(model.inner(), BufWriter::new(File::create(path)?)),
    }
}

/// Load a trained model, choosing the format from the file extension
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<TrainedModel> {
    match ModelFormat::from_path(&path) {
        ModelFormat::Json => SerializableModel::load_from_file(path)?.to_trained_model(),
        ModelFormat::Text => {
            let svm = read_text(BufReader::new(File::open(path)?))?;
            let config = SmoConfig {
                kernel: svm.kernel().clone(),
                aux: svm.aux(),
                regression: svm.mode() == Mode::Regression,
                ..SmoConfig::default()
            };
            Ok(TrainedModel::new(svm, config, None))
        }
    }
}
