use std::io;

use ntuple_graph_analysis::AnalysisError;
use ntuple_graph_core::PipelineError;
use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("{source}"))]
    Pipeline { source: PipelineError },

    #[snafu(display("{source}"))]
    Analysis { source: AnalysisError },

    #[snafu(display("Output directory does not exist: {path}"))]
    OutputDirMissing { path: String },

    #[snafu(display("Cannot read config file {path}: {source}"))]
    ReadConfig { path: String, source: io::Error },

    #[snafu(display("Invalid config file {path}: {source}"))]
    ParseConfig {
        path: String,
        source: serde_json::Error,
    },
}
