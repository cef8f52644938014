//! Crate-wide error type.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or draining a signal pipeline.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("{path} is not sorted: {chrom}:{start} appears after {prev_chrom}:{prev_start}")]
    Unsorted {
        path: String,
        chrom: String,
        start: u64,
        prev_chrom: String,
        prev_start: u64,
    },

    #[error("no index found for {0}")]
    MissingIndex(PathBuf),

    #[error("seek is not supported on {0}")]
    SeekUnsupported(&'static str),

    #[error("negative coverage depth at {chrom}:{pos}")]
    NegativeDepth { chrom: String, pos: u64 },

    #[error("expected zero values but found {value} at {chrom}:{start}")]
    NonZero {
        chrom: String,
        start: u64,
        value: f64,
    },

    #[error("output file {0} already exists, delete it first")]
    OutputExists(PathBuf),

    #[error("paste input ran out of lines")]
    PasteExhausted,

    #[error("invalid command: {0}")]
    Command(String),
}

pub type Result<T> = std::result::Result<T, SignalError>;
