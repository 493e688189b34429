//! Run one analysis over event ntuples.
//!
//! ```text
//! ntuple-graph <analysis> <output> <file> [file...]
//! ```
//!
//! Input files holding the primary event table and files holding the
//! companion weights table may be mixed; each table is chained in the order
//! given, and the two chains are joined row by row.
//!
//! `--config` reads a JSON [`PipelineConfig`]; `--batch-size` and
//! `--no-progress` override it.

mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use ntuple_graph_analysis::{AnalysisHandler, AnalysisLoader, SEARCH_PATH_ENV};
use ntuple_graph_core::{Pipeline, PipelineConfig};
use snafu::{ResultExt, ensure};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::{
    AnalysisSnafu, CliResult, OutputDirMissingSnafu, ParseConfigSnafu, PipelineSnafu, ReadConfigSnafu,
};

#[derive(Debug, Parser)]
#[command(name = "ntuple-graph", version, about = "Run an analysis over event ntuples")]
struct Cli {
    /// Analysis name: a built-in or a descriptor found on the search path
    #[arg(value_name = "ANALYSIS")]
    analysis: String,

    /// Where the analysis writes its output
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Input files: the primary ntuple, more ntuples, weights files
    #[arg(value_name = "FILE", required = true, num_args = 1..)]
    files: Vec<PathBuf>,

    /// JSON pipeline settings (table and column names, beams, batch size)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Rows decoded per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Do not print the progress line
    #[arg(long)]
    no_progress: bool,
}

fn load_config(path: Option<&Path>) -> CliResult<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let path_str = path.display().to_string();
    let text = fs::read_to_string(path).context(ReadConfigSnafu { path: &path_str })?;
    serde_json::from_str(&text).context(ParseConfigSnafu { path: path_str })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> CliResult<()> {
    if let Some(dir) = cli.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        ensure!(
            dir.is_dir(),
            OutputDirMissingSnafu {
                path: dir.display().to_string(),
            }
        );
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    config.show_progress &= !cli.no_progress;
    let mut pipeline = Pipeline::new(config);
    pipeline.open_paths(&cli.files).context(PipelineSnafu)?;
    pipeline.classify().context(PipelineSnafu)?;

    let loader = AnalysisLoader::from_env();
    if !loader.search_path().is_empty() {
        info!(env = SEARCH_PATH_ENV, dirs = ?loader.search_path(), "analysis search path");
    }
    let mut handler = AnalysisHandler::new(loader);
    handler.add_analysis(&cli.analysis).context(AnalysisSnafu)?;
    info!(analyses = ?handler.analysis_names(), "analyses resolved");

    let events = pipeline.stream(&mut handler).context(PipelineSnafu)?;
    pipeline
        .finish(&mut handler, &cli.output)
        .context(PipelineSnafu)?;
    info!(events, output = %cli.output.display(), "done");
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // help and version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
