use std::io;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use snafu::{Backtrace, prelude::*};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the event store backends.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// The file could not be read from disk.
    #[snafu(display("Cannot open input file {path}: {source}"))]
    OpenFile {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// The file is not a readable Parquet file.
    #[snafu(display("Cannot read Parquet metadata from {path}: {source}"))]
    ParquetRead {
        /// Offending path.
        path: String,
        /// Underlying Parquet error.
        source: ParquetError,
        /// Backtrace captured at the failure site.
        backtrace: Backtrace,
    },

    /// Decoding a record batch failed.
    #[snafu(display("Cannot decode rows of table {table} in {path}: {source}"))]
    ArrowRead {
        /// Offending path.
        path: String,
        /// Table being read.
        table: String,
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// The file does not hold the requested table.
    #[snafu(display("File {path} has no table named {table}"))]
    TableMissing {
        /// Offending path.
        path: String,
        /// Requested table.
        table: String,
    },
}
