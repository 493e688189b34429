//! Error types and SNAFU context selectors for the pipeline driver.

use std::error::Error;

use snafu::prelude::*;

use super::PipelineState;
use crate::classify::ClassifyError;
use crate::field::FieldError;
use crate::store::StoreError;
use crate::weights::WeightError;

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while driving a run.
///
/// Everything up to and including classification is a startup failure: no
/// row has been handed to the engine yet. The remaining variants abort a run
/// in progress; no output is written in either case.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    /// An input file could not be opened.
    #[snafu(display("{source}"))]
    Open {
        /// Underlying store error.
        #[snafu(source, backtrace)]
        source: StoreError,
    },

    /// Input files could not be sorted into table chains.
    #[snafu(display("{source}"))]
    Classify {
        /// Underlying classification error.
        source: ClassifyError,
    },

    /// The primary table lacks a required column or uses an unsupported type.
    #[snafu(display("Primary table layout is not usable: {source}"))]
    Layout {
        /// Underlying field resolution error.
        source: FieldError,
    },

    /// Weight streams could not be discovered.
    #[snafu(display("{source}"))]
    Weights {
        /// Underlying weight error.
        source: WeightError,
    },

    /// Reading rows from the store failed mid-run.
    #[snafu(display("Failed reading input rows: {source}"))]
    ReadRows {
        /// Underlying store error.
        #[snafu(source, backtrace)]
        source: StoreError,
    },

    /// A batch no longer matches the layout resolved at open time.
    #[snafu(display("Failed binding columns of a new batch: {source}"))]
    Bind {
        /// Underlying field error.
        source: FieldError,
    },

    /// The companion weight chain ran out before the primary chain.
    #[snafu(display(
        "Weights table ended at row {position} while the primary table has more rows; \
         primary and weights files must be supplied in matching order with equal row counts"
    ))]
    CompanionExhausted {
        /// Zero-based primary row that had no companion row.
        position: u64,
    },

    /// The analysis engine reported a failure.
    #[snafu(display("Analysis engine failed during {stage}: {source}"))]
    Engine {
        /// Engine call that failed.
        stage: &'static str,
        /// Error reported by the engine.
        source: Box<dyn Error + Send + Sync>,
    },

    /// A pipeline step was called out of order.
    #[snafu(display("Pipeline is {found:?}, expected {expected:?}"))]
    InvalidState {
        /// State the step requires.
        expected: PipelineState,
        /// State the pipeline was in.
        found: PipelineState,
    },
}
