//! The contract between the pipeline and an analysis engine.

use std::error::Error;
use std::path::Path;

use crate::graph::EventGraph;

/// A consumer of event graphs.
///
/// The pipeline calls [`analyze`](Self::analyze) once per row, in row order,
/// then [`finalize`](Self::finalize) once and
/// [`write_output`](Self::write_output) once. The graph passed to `analyze`
/// is reused for the next row, so an engine must copy out whatever it wants
/// to keep.
pub trait AnalysisEngine {
    /// Error type reported by the engine.
    type Error: Error + Send + Sync + 'static;

    /// Consume one event.
    fn analyze(&mut self, event: &EventGraph) -> Result<(), Self::Error>;

    /// Close the run: normalise, compute derived results.
    fn finalize(&mut self) -> Result<(), Self::Error>;

    /// Persist results to `path`.
    fn write_output(&self, path: &Path) -> Result<(), Self::Error>;
}

impl<E: AnalysisEngine + ?Sized> AnalysisEngine for &mut E {
    type Error = E::Error;

    fn analyze(&mut self, event: &EventGraph) -> Result<(), Self::Error> {
        (**self).analyze(event)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        (**self).finalize()
    }

    fn write_output(&self, path: &Path) -> Result<(), Self::Error> {
        (**self).write_output(path)
    }
}
