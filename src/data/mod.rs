//! Datasets and file readers
//!
//! Every reader produces a `DenseDataset`, the in-memory `Dataset`
//! implementation the trainer consumes.

pub mod csv;
pub mod dense;
pub mod libsvm;

pub use self::csv::CsvOptions;
pub use self::dense::DenseDataset;
