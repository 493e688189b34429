//! Core of `ntuple-graph`: translate columnar event ntuples into event graphs.
//!
//! The pipeline reads a primary event table (one row per simulated event,
//! variable-length particle arrays) plus an optional companion table of
//! per-event weights, and hands one [`graph::EventGraph`] per row to an
//! [`analysis::AnalysisEngine`].
//!
//! - `store`: the columnar event store seen through the [`store::EventFile`]
//!   trait, with a Parquet backend and an in-memory backend.
//! - `field`: column accessors that resolve narrow/wide floats once at open
//!   time.
//! - `classify`: sorts input files into the primary and companion chains.
//! - `cursor`: row cursors over a chain of files.
//! - `weights`: weight stream discovery and per-row weight reading.
//! - `reader`: the primary-row layout (`id`, `nparticle`, `kf`, momenta).
//! - `graph`: the event graph model and its builder.
//! - `progress`: throttled progress reporting for the row loop.
//! - `pipeline`: the driver tying everything together.
//!
//! Analysis engines are external; see the `ntuple-graph-analysis` crate for
//! a reference implementation.
#![deny(missing_docs)]
pub mod analysis;
pub mod classify;
pub mod cursor;
pub mod field;
pub mod graph;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod store;
pub mod weights;

#[cfg(test)]
pub(crate) mod test_util;

pub use analysis::AnalysisEngine;
pub use graph::{EventGraph, GraphBuilder};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineState, RunSummary};
pub use weights::WeightRow;
