//! Error types shared across the crate
//!
//! Tensor arithmetic reports [`TensorError`], model files report
//! [`ModelError`], the CSV loader reports [`DataError`]. Everything the network
//! driver does funnels into [`Error`].

use std::io;

use thiserror::Error;

/// Failures of tensor construction and arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("incompatible shapes for {op}: {left:?} and {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    #[error("element count mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("{op} is not supported for rank {rank} tensors")]
    UnsupportedRank { op: &'static str, rank: usize },
}

impl TensorError {
    pub(crate) fn shape_mismatch(op: &'static str, left: &[usize], right: &[usize]) -> Self {
        TensorError::ShapeMismatch {
            op,
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }
}

/// Failures while reading or writing a persisted model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: unknown layer tag `{tag}`")]
    UnknownLayerTag { line: usize, tag: String },

    #[error("line {line}: record ends early, expected {expected}")]
    Truncated { line: usize, expected: &'static str },

    #[error("line {line}: `{token}` is not a valid {expected}")]
    InvalidNumber {
        line: usize,
        token: String,
        expected: &'static str,
    },

    #[error("line {line}: {what} has invalid shape {rows}x{cols}")]
    InvalidShape {
        line: usize,
        what: &'static str,
        rows: usize,
        cols: usize,
    },
}

/// Failures of the CSV digit loader
#[derive(Error, Debug)]
pub enum DataError {
    #[error("dataset I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("no samples available")]
    Empty,

    #[error("sample {index} has {actual} values, expected {expected}")]
    Ragged {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("label {label} does not fit {classes} classes")]
    LabelOutOfRange { label: u8, classes: usize },
}

/// A string did not name a known loss, optimizer or schedule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind} name `{value}`")]
pub struct ParseKindError {
    pub kind: &'static str,
    pub value: String,
}

/// Crate level error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("{layer}: backward called without a matching forward pass")]
    NoForwardPass { layer: &'static str },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
