//! Reference analysis engine for `ntuple-graph`.
//!
//! [`AnalysisHandler`] implements [`ntuple_graph_core::AnalysisEngine`] by
//! running a set of named analyses, resolved by [`AnalysisLoader`] from the
//! built-ins and from JSON descriptors on a search path, and writing their
//! histograms and counters as one JSON document.
#![deny(missing_docs)]

pub mod analyses;
pub mod error;
pub mod handler;
pub mod histogram;
pub mod loader;

pub use analyses::{Analysis, BUILTINS, MC_FINALSTATE, MC_MULTIPLICITY, MC_XS};
pub use error::{AnalysisError, AnalysisResult};
pub use handler::AnalysisHandler;
pub use loader::{AnalysisLoader, Descriptor, SEARCH_PATH_ENV};
