// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! sigtools: a streaming engine for genome-wide numeric signals.
//!
//! A genomic signal is a piecewise-constant function from positions on
//! named chromosomes to real values. This library parses several track
//! formats into sorted interval streams and combines them through a lazy
//! iterator algebra:
//!
//! - unary operators transform one stream interval by interval
//! - the multiplexer aligns K streams position by position, feeding the
//!   reducers (sum, mean, median, ...)
//! - integrators reduce a whole stream to a scalar in a single pass
//! - the apply engine evaluates statistics or profiles per region
//! - multisets of multiplexers feed the two-sample tests
//!
//! Everything is pull-driven: nothing reads ahead of the consumer beyond
//! the bounded queues of the background decode and format threads.
//!
//! # Example
//!
//! ```rust,no_run
//! use sigtools::config::PipelineOptions;
//! use sigtools::parser::{parse_program, statements};
//!
//! let tokens: Vec<String> = "AUC signal.bg".split_whitespace().map(String::from).collect();
//! let program = parse_program(&tokens, PipelineOptions::default()).unwrap();
//! program.execute(Box::new(std::io::stdout())).unwrap();
//! ```

pub mod apply;
pub mod buffered;
pub mod config;
pub mod error;
pub mod interval;
pub mod multiplexer;
pub mod multiset;
pub mod ops;
pub mod parser;
pub mod readers;
pub mod reducers;
pub mod setcmp;
pub mod signal;
pub mod stats;
pub mod writer;

// Re-export commonly used types
pub use error::{Result, SignalError};
pub use interval::{Chrom, Interval, Strand};
pub use signal::{Cursor, MemoryIter, SignalIter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::PipelineOptions;
    pub use crate::error::{Result, SignalError};
    pub use crate::interval::{Chrom, Interval, Strand};
    pub use crate::multiplexer::Multiplexer;
    pub use crate::multiset::Multiset;
    pub use crate::reducers::{Reduce, ReduceOp};
    pub use crate::signal::{Cursor, MemoryIter, SignalIter};
    pub use crate::stats::{Integrator, StatKind};
}
