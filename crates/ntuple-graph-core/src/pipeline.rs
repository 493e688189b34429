//! The pipeline driver.
//!
//! A [`Pipeline`] walks one run through a fixed sequence of steps:
//!
//! ```text
//! Uninitialized -> FilesOpened -> SchemaClassified -> Streaming -> Finalized
//! ```
//!
//! Every step checks the current state first and fails with
//! [`PipelineError::InvalidState`] when called out of order. Any failure
//! moves the pipeline to [`PipelineState::Failed`], from which no step can
//! be taken.
//!
//! Streaming reads the primary chain row by row, advances the companion
//! weight chain in lockstep (row `i` pairs with row `i`), rebuilds one
//! recycled [`EventGraph`] per row and hands it to the engine.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::analysis::AnalysisEngine;
use crate::classify::{Classification, TableNames, classify};
use crate::graph::{BeamConfig, EventGraph, GraphBuilder};
use crate::progress::ProgressCounter;
use crate::reader::{ColumnNames, PrimaryColumns, PrimaryLayout};
use crate::store::{self, EventFile};
use crate::weights::{BoundWeights, WeightReconciler, WeightSide};

mod error;

pub use error::{PipelineError, PipelineResult};
use error::*;

/// Default number of rows decoded per batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Settings of one run. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Names of the primary and companion tables.
    pub tables: TableNames,
    /// Column names of the primary table.
    pub columns: ColumnNames,
    /// Beam particles attached to every graph.
    pub beam: BeamConfig,
    /// Rows decoded per batch.
    pub batch_size: usize,
    /// Print a progress line on stderr while streaming.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            columns: ColumnNames::default(),
            beam: BeamConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: true,
        }
    }
}

/// Where a [`Pipeline`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing done yet.
    Uninitialized,
    /// Input files are open.
    FilesOpened,
    /// Files are sorted into chains; layout and weights are resolved.
    SchemaClassified,
    /// Rows have been handed to the engine.
    Streaming,
    /// The engine was finalized and wrote its output.
    Finalized,
    /// A step failed; the run cannot continue.
    Failed,
}

/// What a completed run processed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Number of events handed to the engine.
    pub events: u64,
    /// Weight names, in stream order.
    pub weight_names: Vec<String>,
}

/// Everything resolved at classification time.
#[derive(Debug)]
struct Session {
    classification: Classification,
    layout: PrimaryLayout,
    weights: WeightReconciler,
}

/// Drives one run from input files to engine output.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    state: PipelineState,
    files: Vec<Arc<dyn EventFile>>,
    session: Option<Session>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// A pipeline in the `Uninitialized` state.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            state: PipelineState::Uninitialized,
            files: Vec::new(),
            session: None,
        }
    }

    /// Settings of this run.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Classification result, once available.
    pub fn classification(&self) -> Option<&Classification> {
        self.session.as_ref().map(|s| &s.classification)
    }

    /// Weight names, once classified.
    pub fn weight_names(&self) -> Option<&[String]> {
        self.session.as_ref().map(|s| &s.weights.names()[..])
    }

    /// Rows in the primary chain, once classified.
    pub fn total_events(&self) -> Option<u64> {
        self.session
            .as_ref()
            .map(|s| s.classification.primary.total_rows())
    }

    fn require(&self, expected: PipelineState) -> PipelineResult<()> {
        ensure!(
            self.state == expected,
            InvalidStateSnafu {
                expected,
                found: self.state,
            }
        );
        Ok(())
    }

    fn settle<T>(&mut self, next: PipelineState, result: PipelineResult<T>) -> PipelineResult<T> {
        self.state = if result.is_ok() {
            next
        } else {
            PipelineState::Failed
        };
        result
    }

    /// Open every path with the Parquet backend, in order.
    pub fn open_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> PipelineResult<()> {
        self.require(PipelineState::Uninitialized)?;
        let opened = paths
            .iter()
            .map(|p| store::open_file(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .context(OpenSnafu);
        match opened {
            Ok(files) => self.open_files(files),
            Err(e) => self.settle(PipelineState::Failed, Err(e)),
        }
    }

    /// Take already opened files, in order.
    pub fn open_files(&mut self, files: Vec<Arc<dyn EventFile>>) -> PipelineResult<()> {
        self.require(PipelineState::Uninitialized)?;
        debug!(count = files.len(), "input files opened");
        self.files = files;
        self.state = PipelineState::FilesOpened;
        Ok(())
    }

    /// Sort files into chains, resolve the primary layout and discover the
    /// weight streams.
    pub fn classify(&mut self) -> PipelineResult<()> {
        self.require(PipelineState::FilesOpened)?;
        let session = self.resolve_session();
        let session = self.settle(PipelineState::SchemaClassified, session)?;

        info!(
            weights = ?&session.weights.names()[..],
            source = match session.weights.side() {
                WeightSide::Primary => "inline",
                WeightSide::Companion => "weights table",
            },
            "weight streams"
        );
        info!(events = session.classification.primary.total_rows(), "events to process");
        self.session = Some(session);
        Ok(())
    }

    fn resolve_session(&self) -> PipelineResult<Session> {
        let classification = classify(&self.files, &self.config.tables).context(ClassifySnafu)?;
        let primary = &classification.primary;
        let layout = PrimaryLayout::resolve(primary.name(), primary.schema(), &self.config.columns)
            .context(LayoutSnafu)?;
        let weights = WeightReconciler::discover(
            primary,
            classification.companion.as_ref(),
            &self.config.columns.weight,
        )
        .context(WeightsSnafu)?;
        Ok(Session {
            classification,
            layout,
            weights,
        })
    }

    /// Hand every row to `engine`, printing progress on stderr when the
    /// configuration asks for it. Returns the number of events processed.
    pub fn stream<E: AnalysisEngine>(&mut self, engine: &mut E) -> PipelineResult<u64> {
        if self.config.show_progress {
            let total = self.total_events().unwrap_or(0);
            self.stream_with_progress(engine, ProgressCounter::new(total))
        } else {
            let events = self.stream_with(engine, None)?;
            info!(events, "events processed");
            Ok(events)
        }
    }

    /// Hand every row to `engine`, advancing `progress` once per row.
    ///
    /// The counter's final report is drawn before the run is logged.
    pub fn stream_with_progress<E: AnalysisEngine>(
        &mut self,
        engine: &mut E,
        mut progress: ProgressCounter,
    ) -> PipelineResult<u64> {
        let result = self.stream_with(engine, Some(&mut progress));
        drop(progress);
        let events = result?;
        info!(events, "events processed");
        Ok(events)
    }

    fn stream_with<E: AnalysisEngine>(
        &mut self,
        engine: &mut E,
        progress: Option<&mut ProgressCounter>,
    ) -> PipelineResult<u64> {
        self.require(PipelineState::SchemaClassified)?;
        self.state = PipelineState::Streaming;

        let result = match self.session.as_ref() {
            Some(session) => {
                let builder = GraphBuilder::new(self.config.beam);
                let batch_size = self.config.batch_size.max(1);
                stream_rows(session, &builder, batch_size, engine, progress)
            }
            None => InvalidStateSnafu {
                expected: PipelineState::SchemaClassified,
                found: self.state,
            }
            .fail(),
        };
        self.settle(PipelineState::Streaming, result)
    }

    /// Finalize `engine` and have it write its output to `output`.
    pub fn finish<E: AnalysisEngine>(&mut self, engine: &mut E, output: &Path) -> PipelineResult<()> {
        self.require(PipelineState::Streaming)?;
        let result = engine
            .finalize()
            .map_err(boxed)
            .context(EngineSnafu { stage: "finalize" })
            .and_then(|()| {
                engine
                    .write_output(output)
                    .map_err(boxed)
                    .context(EngineSnafu {
                        stage: "write_output",
                    })
            });
        self.settle(PipelineState::Finalized, result)?;
        info!(path = %output.display(), "output written");
        Ok(())
    }

    /// Run every step: open `inputs`, classify, stream into `engine`, then
    /// finalize and write to `output`.
    pub fn run<P: AsRef<Path>, E: AnalysisEngine>(
        &mut self,
        inputs: &[P],
        engine: &mut E,
        output: &Path,
    ) -> PipelineResult<RunSummary> {
        self.open_paths(inputs)?;
        self.classify()?;
        let events = self.stream(engine)?;
        self.finish(engine, output)?;
        Ok(RunSummary {
            events,
            weight_names: self.weight_names().map(<[String]>::to_vec).unwrap_or_default(),
        })
    }
}

fn boxed<E: Error + Send + Sync + 'static>(e: E) -> Box<dyn Error + Send + Sync> {
    Box::new(e)
}

fn stream_rows<E: AnalysisEngine>(
    session: &Session,
    builder: &GraphBuilder,
    batch_size: usize,
    engine: &mut E,
    mut progress: Option<&mut ProgressCounter>,
) -> PipelineResult<u64> {
    let Session {
        classification,
        layout,
        weights: reconciler,
    } = session;

    let mut primary = classification.primary.cursor(batch_size);
    let mut companion = classification
        .companion
        .as_ref()
        .map(|chain| chain.cursor(batch_size));

    let mut primary_columns: Option<PrimaryColumns> = None;
    let mut weight_columns: Option<BoundWeights> = None;
    let mut weights = reconciler.new_row();
    let mut graph = EventGraph::new();
    let mut events = 0;

    while let Some(pos) = primary.advance().context(ReadRowsSnafu)? {
        let columns = match primary_columns.take() {
            Some(columns) if !pos.new_batch => columns,
            _ => layout.bind(pos.batch).context(BindSnafu)?,
        };

        let weight_pos = match companion.as_mut() {
            Some(cursor) => match cursor.advance().context(ReadRowsSnafu)? {
                Some(weight_pos) => weight_pos,
                None => {
                    return CompanionExhaustedSnafu {
                        position: pos.position,
                    }
                    .fail();
                }
            },
            None => pos,
        };
        let bound = match weight_columns.take() {
            Some(bound) if !weight_pos.new_batch => bound,
            _ => reconciler.bind(weight_pos.batch).context(BindSnafu)?,
        };
        bound.read_into(weight_pos.row, &mut weights);

        builder.build_into(&columns.row(pos.row), &weights, &mut graph);
        engine
            .analyze(&graph)
            .map_err(boxed)
            .context(EngineSnafu { stage: "analyze" })?;

        events += 1;
        if let Some(progress) = progress.as_deref_mut() {
            progress.inc();
        }
        primary_columns = Some(columns);
        weight_columns = Some(bound);
    }
    Ok(events)
}
