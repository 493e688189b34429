//! The analysis handler: runs a set of analyses as one engine.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use snafu::prelude::*;
use tracing::info;

use ntuple_graph_core::graph::{LENGTH_UNIT, MOMENTUM_UNIT};
use ntuple_graph_core::{AnalysisEngine, EventGraph};

use crate::analyses::{Analysis, Report};
use crate::error::*;
use crate::loader::AnalysisLoader;

/// Runs every registered analysis on each event.
///
/// Weight names and beams are latched from the first event; analyses are
/// initialised for those weights at that point.
#[derive(Debug)]
pub struct AnalysisHandler {
    loader: AnalysisLoader,
    analyses: Vec<Box<dyn Analysis>>,
    weight_names: Option<Arc<[String]>>,
    beams: Option<[Beam; 2]>,
    events: u64,
    finalized: bool,
}

/// Units of every momentum, energy and length in the output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Units {
    /// Momentum and energy unit.
    pub momentum: &'static str,
    /// Length unit.
    pub length: &'static str,
}

/// One incoming beam as seen in the first event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Beam {
    /// PDG code.
    pub pdg_id: i32,
    /// Energy.
    pub energy: f64,
}

/// The JSON document written by [`AnalysisHandler`].
#[derive(Debug, Serialize)]
pub struct Output<'a> {
    /// Units of the graph the analyses read.
    pub units: Units,
    /// Incoming beams, absent when no event was analyzed.
    pub beams: Option<[Beam; 2]>,
    /// Events analyzed.
    pub events: u64,
    /// Weight names, in stream order.
    pub weights: &'a [String],
    /// Per-analysis results, in registration order.
    pub analyses: Vec<AnalysisOutput<'a>>,
}

/// Results of one analysis in the output document.
#[derive(Debug, Serialize)]
pub struct AnalysisOutput<'a> {
    /// Analysis name.
    pub name: &'a str,
    /// Its report.
    #[serde(flatten)]
    pub report: Report,
}

impl Default for AnalysisHandler {
    fn default() -> Self {
        Self::new(AnalysisLoader::from_env())
    }
}

impl AnalysisHandler {
    /// A handler resolving names through `loader`.
    pub fn new(loader: AnalysisLoader) -> Self {
        Self {
            loader,
            analyses: Vec::new(),
            weight_names: None,
            beams: None,
            events: 0,
            finalized: false,
        }
    }

    /// Resolve and register the analysis called `name`.
    pub fn add_analysis(&mut self, name: &str) -> AnalysisResult<()> {
        ensure!(
            !self.analyses.iter().any(|a| a.name() == name),
            DuplicateSnafu { name }
        );
        let analysis = self.loader.load(name)?;
        info!(analysis = name, "analysis loaded");
        self.analyses.push(analysis);
        Ok(())
    }

    /// Registered analysis names, in registration order.
    pub fn analysis_names(&self) -> Vec<&str> {
        self.analyses.iter().map(|a| a.name()).collect()
    }

    /// Events analyzed so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Weight names latched from the first event.
    pub fn weight_names(&self) -> &[String] {
        self.weight_names.as_deref().unwrap_or_default()
    }

    /// The output document.
    pub fn output(&self) -> Output<'_> {
        Output {
            units: Units {
                momentum: MOMENTUM_UNIT,
                length: LENGTH_UNIT,
            },
            beams: self.beams,
            events: self.events,
            weights: self.weight_names(),
            analyses: self
                .analyses
                .iter()
                .map(|a| AnalysisOutput {
                    name: a.name(),
                    report: a.report(),
                })
                .collect(),
        }
    }
}

impl AnalysisEngine for AnalysisHandler {
    type Error = AnalysisError;

    fn analyze(&mut self, event: &EventGraph) -> AnalysisResult<()> {
        ensure!(!self.finalized, AlreadyFinalizedSnafu);
        if self.weight_names.is_none() {
            let names = Arc::clone(event.weights().shared_names());
            for analysis in &mut self.analyses {
                analysis.init(&names);
            }
            self.weight_names = Some(names);
            self.beams = event.beam_particles().map(|(a, b)| {
                [a, b].map(|p| Beam {
                    pdg_id: p.pdg_id,
                    energy: p.momentum.e,
                })
            });
        }
        for analysis in &mut self.analyses {
            analysis.analyze(event);
        }
        self.events += 1;
        Ok(())
    }

    fn finalize(&mut self) -> AnalysisResult<()> {
        if self.weight_names.is_none() {
            // no events: report empty per-weight results
            for analysis in &mut self.analyses {
                analysis.init(&[]);
            }
        }
        for analysis in &mut self.analyses {
            analysis.finalize();
        }
        self.finalized = true;
        Ok(())
    }

    fn write_output(&self, path: &Path) -> AnalysisResult<()> {
        ensure!(self.finalized, NotFinalizedSnafu);
        let json = serde_json::to_vec_pretty(&self.output()).context(SerializeOutputSnafu)?;
        fs::write(path, json).context(WriteOutputSnafu {
            path: path.display().to_string(),
        })
    }
}
