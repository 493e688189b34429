//! Resolving analysis names.
//!
//! A name resolves against the built-in analyses and against descriptor
//! files `<name>.json` in each directory of the search path, which is read
//! from [`SEARCH_PATH_ENV`] (entries separated like `PATH`). Exactly one
//! candidate must match.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use snafu::prelude::*;
use tracing::{debug, warn};

use crate::analyses::{self, Analysis, HistoSpec, Observable, ObservableAnalysis, BUILTINS};
use crate::error::*;

/// Environment variable holding the descriptor search path.
pub const SEARCH_PATH_ENV: &str = "NTUPLE_GRAPH_ANALYSIS_PATH";

const DESCRIPTOR_EXTENSION: &str = "json";

/// A single-histogram analysis described in JSON.
///
/// ```json
/// { "name": "PHOTON_E", "observable": "energy", "bins": 20, "min": 0, "max": 200, "pdg_id": 22 }
/// ```
///
/// With `"normalize": true` the histograms are scaled to unit area when the
/// run is finalized.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Descriptor {
    /// Informational name; the file stem is what the analysis is looked up by.
    #[serde(default)]
    pub name: Option<String>,
    /// Quantity to histogram.
    pub observable: Observable,
    /// Number of uniform bins.
    pub bins: usize,
    /// Lower edge.
    pub min: f64,
    /// Upper edge.
    pub max: f64,
    /// Restrict to one particle species.
    #[serde(default)]
    pub pdg_id: Option<i32>,
    /// Scale to unit area at finalize.
    #[serde(default)]
    pub normalize: bool,
}

impl Descriptor {
    /// Read and parse a descriptor file.
    pub fn read(path: &Path) -> AnalysisResult<Self> {
        let path_str = path.display().to_string();
        let text = fs::read_to_string(path).context(ReadDescriptorSnafu { path: &path_str })?;
        serde_json::from_str(&text).context(ParseDescriptorSnafu { path: path_str })
    }

    /// Build the analysis, registered as `name`.
    pub fn build(&self, name: &str) -> AnalysisResult<ObservableAnalysis> {
        let spec = HistoSpec::new(
            self.observable.as_str(),
            self.observable,
            self.bins,
            self.min,
            self.max,
        )?;
        Ok(ObservableAnalysis::new(name, vec![spec], self.pdg_id).normalized(self.normalize))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Candidate {
    Builtin,
    Descriptor(PathBuf),
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Builtin => f.write_str("built-in"),
            Candidate::Descriptor(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Finds analyses by name.
#[derive(Debug, Clone, Default)]
pub struct AnalysisLoader {
    search_path: Vec<PathBuf>,
}

impl AnalysisLoader {
    /// A loader searching `search_path` for descriptors.
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self { search_path }
    }

    /// A loader whose search path comes from [`SEARCH_PATH_ENV`].
    pub fn from_env() -> Self {
        let search_path = env::var_os(SEARCH_PATH_ENV)
            .map(|value| {
                env::split_paths(&value)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self::new(search_path)
    }

    /// Descriptor directories, in search order.
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    fn candidates(&self, name: &str) -> Vec<Candidate> {
        // names are plain file stems, never paths
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Vec::new();
        }
        let mut found = Vec::new();
        if BUILTINS.contains(&name) {
            found.push(Candidate::Builtin);
        }
        for dir in &self.search_path {
            let path = dir.join(format!("{name}.{DESCRIPTOR_EXTENSION}"));
            if path.is_file() {
                found.push(Candidate::Descriptor(path));
            }
        }
        found
    }

    /// Resolve `name` to a fresh analysis.
    pub fn load(&self, name: &str) -> AnalysisResult<Box<dyn Analysis>> {
        let not_found = || NotFoundSnafu {
            name,
            env_var: SEARCH_PATH_ENV,
            available: self.available(),
        };
        match self.candidates(name).as_slice() {
            [] => not_found().fail(),
            [Candidate::Builtin] => {
                debug!(analysis = name, "using built-in analysis");
                analyses::builtin(name).with_context(not_found)?
            }
            [Candidate::Descriptor(path)] => {
                debug!(analysis = name, path = %path.display(), "using analysis descriptor");
                let descriptor = Descriptor::read(path)?;
                if let Some(declared) = descriptor.name.as_deref().filter(|d| *d != name) {
                    warn!(analysis = name, declared, "descriptor name differs from its file name");
                }
                Ok(Box::new(descriptor.build(name)?))
            }
            many => AmbiguousSnafu {
                name,
                candidates: many.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }
            .fail(),
        }
    }

    /// Every name that [`load`](Self::load) could be asked for, sorted.
    ///
    /// Unreadable search directories are skipped.
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTINS.iter().map(|s| s.to_string()).collect();
        for dir in &self.search_path {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == DESCRIPTOR_EXTENSION) {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(format!("{name}.json"));
        fs::write(&path, body).unwrap();
        path
    }

    const PHOTON_E: &str =
        r#"{ "observable": "energy", "bins": 10, "min": 0.0, "max": 100.0, "pdg_id": 22 }"#;

    #[test]
    fn builtins_load_without_search_path() {
        let loader = AnalysisLoader::default();
        for name in BUILTINS {
            assert_eq!(loader.load(name).unwrap().name(), name);
        }
    }

    #[test]
    fn unknown_name_lists_what_is_available() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "PHOTON_E", PHOTON_E);
        let err = AnalysisLoader::new(vec![dir.path().into()]).load("NOPE").unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::NotFound { ref available, .. }
                if available == &["MC_FINALSTATE", "MC_MULTIPLICITY", "MC_XS", "PHOTON_E"]
        ));
        let message = err.to_string();
        assert!(message.contains(SEARCH_PATH_ENV));
        assert!(message.contains("available: MC_FINALSTATE, MC_MULTIPLICITY, MC_XS, PHOTON_E"));
    }

    #[test]
    fn descriptors_are_found_on_the_search_path() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "PHOTON_E", PHOTON_E);
        let loader = AnalysisLoader::new(vec![PathBuf::from("/nonexistent"), dir.path().into()]);

        let analysis = loader.load("PHOTON_E").unwrap();
        assert_eq!(analysis.name(), "PHOTON_E");
    }

    #[test]
    fn several_matches_are_ambiguous() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "PHOTON_E", PHOTON_E);
        write(b.path(), "PHOTON_E", PHOTON_E);
        write(a.path(), "MC_XS", PHOTON_E);
        let loader = AnalysisLoader::new(vec![a.path().into(), b.path().into()]);

        let err = loader.load("PHOTON_E").unwrap_err();
        assert!(matches!(err, AnalysisError::Ambiguous { ref candidates, .. } if candidates.len() == 2));

        let err = loader.load("MC_XS").unwrap_err();
        assert!(matches!(err, AnalysisError::Ambiguous { ref candidates, .. } if candidates[0] == "built-in"));
    }

    #[test]
    fn malformed_descriptors_are_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "BROKEN", r#"{ "observable": "rapidity", "bins": 1, "min": 0, "max": 1 }"#);
        write(dir.path(), "EMPTY", r#"{ "observable": "pt", "bins": 0, "min": 0, "max": 1 }"#);
        let loader = AnalysisLoader::new(vec![dir.path().into()]);

        assert!(matches!(
            loader.load("BROKEN").unwrap_err(),
            AnalysisError::ParseDescriptor { .. }
        ));
        assert!(matches!(
            loader.load("EMPTY").unwrap_err(),
            AnalysisError::InvalidBinning { .. }
        ));
    }

    #[test]
    fn path_like_names_never_match() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "PHOTON_E", PHOTON_E);
        let loader = AnalysisLoader::new(vec![dir.path().join("sub")]);
        assert!(loader.load("../PHOTON_E").is_err());
    }
}
