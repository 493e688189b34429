//! Error types and SNAFU context selectors for analysis resolution and output.

use std::io;

use snafu::{Backtrace, prelude::*};

/// Result alias for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors raised while resolving, running or writing analyses.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AnalysisError {
    /// No built-in analysis or descriptor matches the requested name.
    #[snafu(display(
        "Analysis {name} not found (available: {}). \
         Try setting {env_var} to a directory holding {name}.json",
        available.join(", ")
    ))]
    NotFound {
        /// Requested analysis name.
        name: String,
        /// Environment variable holding the search path.
        env_var: &'static str,
        /// Names that would have resolved.
        available: Vec<String>,
    },

    /// Several candidates match the requested name.
    #[snafu(display("Analysis {name} is ambiguous; candidates: {}", candidates.join(", ")))]
    Ambiguous {
        /// Requested analysis name.
        name: String,
        /// Where each candidate came from.
        candidates: Vec<String>,
    },

    /// A descriptor file could not be read.
    #[snafu(display("Cannot read analysis descriptor {path}: {source}"))]
    ReadDescriptor {
        /// Descriptor path.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// A descriptor file is not valid JSON for a descriptor.
    #[snafu(display("Cannot parse analysis descriptor {path}: {source}"))]
    ParseDescriptor {
        /// Descriptor path.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Histogram binning is unusable.
    #[snafu(display("Invalid binning for {name}: {bins} bins over [{min}, {max})"))]
    InvalidBinning {
        /// Histogram or analysis name.
        name: String,
        /// Requested bin count.
        bins: usize,
        /// Lower edge.
        min: f64,
        /// Upper edge.
        max: f64,
    },

    /// The same analysis was added twice.
    #[snafu(display("Analysis {name} is already registered"))]
    Duplicate {
        /// Analysis name.
        name: String,
    },

    /// An event arrived after finalize.
    #[snafu(display("Analysis handler is finalized; no more events can be analyzed"))]
    AlreadyFinalized,

    /// Output was requested before finalize.
    #[snafu(display("Analysis handler must be finalized before writing output"))]
    NotFinalized,

    /// Output could not be serialized.
    #[snafu(display("Cannot serialize analysis output: {source}"))]
    SerializeOutput {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Output could not be written.
    #[snafu(display("Cannot write analysis output to {path}: {source}"))]
    WriteOutput {
        /// Output path.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },
}
