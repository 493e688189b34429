//! Sorting input files into the primary and companion table chains.
//!
//! Each opened file is checked for two table names by key lookup: the
//! primary event table and the companion weight table. A file may hold
//! either, both, or neither; files holding neither are skipped without
//! error. Contributing files are chained in input order.
//!
//! The two chains are joined by row position only: row `i` of the primary
//! chain pairs with row `i` of the companion chain. Callers must supply
//! files in matching, row-count-aligned order; nothing here checks it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};
use serde::Deserialize;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::cursor::ChainCursor;
use crate::store::EventFile;

/// Errors from classifying input files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClassifyError {
    /// None of the inputs holds the primary event table.
    #[snafu(display("No input file contains the primary table {table}"))]
    NoPrimaryTable {
        /// Primary table name that was searched for.
        table: String,
    },

    /// A file's table layout differs from the first file of the same chain.
    #[snafu(display(
        "Table {table} in {path} does not match the layout of {first}; \
         all files of a chain must share column names and types"
    ))]
    InconsistentSchema {
        /// Table name.
        table: String,
        /// File whose layout differs.
        path: String,
        /// First file of the chain.
        first: String,
    },
}

/// Names of the two tables the classifier looks for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TableNames {
    /// Primary event table.
    pub primary: String,
    /// Companion weight table.
    pub weights: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            primary: "t3".to_string(),
            weights: "weights".to_string(),
        }
    }
}

/// Role a file plays after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// Contributes to the primary chain only.
    Primary,
    /// Contributes to the companion chain only.
    Weights,
    /// Contributes to both chains.
    Both,
    /// Matches neither table and is ignored.
    Skipped,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileRole::Primary => "ntuple",
            FileRole::Weights => "weights",
            FileRole::Both => "ntuple+weights",
            FileRole::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One table read across several files, in order.
#[derive(Debug, Clone)]
pub struct TableChain {
    name: String,
    members: Vec<Arc<dyn EventFile>>,
    schema: SchemaRef,
    total_rows: u64,
}

fn same_layout(a: &Schema, b: &Schema) -> bool {
    a.fields().len() == b.fields().len()
        && a.fields()
            .iter()
            .zip(b.fields().iter())
            .all(|(x, y)| x.name() == y.name() && x.data_type().equals_datatype(y.data_type()))
}

impl TableChain {
    fn start(name: &str, file: Arc<dyn EventFile>, schema: SchemaRef, rows: u64) -> Self {
        Self {
            name: name.to_string(),
            members: vec![file],
            schema,
            total_rows: rows,
        }
    }

    fn push(&mut self, file: Arc<dyn EventFile>, schema: &Schema, rows: u64) -> Result<(), ClassifyError> {
        ensure!(
            same_layout(&self.schema, schema),
            InconsistentSchemaSnafu {
                table: self.name.clone(),
                path: file.path().display().to_string(),
                first: self.members[0].path().display().to_string(),
            }
        );
        self.members.push(file);
        self.total_rows += rows;
        Ok(())
    }

    /// Table name shared by every member.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema of the first member, which every other member matches.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Total rows across members, from file metadata.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Member files in chain order.
    pub fn members(&self) -> &[Arc<dyn EventFile>] {
        &self.members
    }

    /// A fresh row cursor positioned before the first row.
    pub fn cursor(&self, batch_size: usize) -> ChainCursor {
        ChainCursor::new(self.name.clone(), self.members.clone(), self.total_rows, batch_size)
    }
}

/// Outcome of classifying a list of input files.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Chain of files holding the primary table.
    pub primary: TableChain,
    /// Chain of files holding the companion weight table, if any did.
    pub companion: Option<TableChain>,
    /// Every input with the role it was given, in input order.
    pub roles: Vec<(PathBuf, FileRole)>,
}

fn add_to_chain(
    chain: &mut Option<TableChain>,
    table: &str,
    file: &Arc<dyn EventFile>,
) -> Result<bool, ClassifyError> {
    let Some(info) = file.table(table) else {
        return Ok(false);
    };
    let (schema, rows) = (info.schema.clone(), info.num_rows);
    match chain {
        Some(c) => c.push(Arc::clone(file), &schema, rows)?,
        None => *chain = Some(TableChain::start(table, Arc::clone(file), schema, rows)),
    }
    Ok(true)
}

/// Classify `files` by the table names they hold.
pub fn classify(
    files: &[Arc<dyn EventFile>],
    names: &TableNames,
) -> Result<Classification, ClassifyError> {
    let mut primary = None;
    let mut companion = None;
    let mut roles = Vec::with_capacity(files.len());

    for file in files {
        let is_primary = add_to_chain(&mut primary, &names.primary, file)?;
        let is_weights = add_to_chain(&mut companion, &names.weights, file)?;

        let role = match (is_primary, is_weights) {
            (true, true) => FileRole::Both,
            (true, false) => FileRole::Primary,
            (false, true) => FileRole::Weights,
            (false, false) => FileRole::Skipped,
        };
        if role == FileRole::Skipped {
            debug!(path = %file.path().display(), "no known table, skipping file");
        } else {
            info!(path = %file.path().display(), role = %role, "input file");
        }
        roles.push((file.path().to_path_buf(), role));
    }

    let primary = primary.context(NoPrimaryTableSnafu {
        table: names.primary.clone(),
    })?;

    Ok(Classification {
        primary,
        companion,
        roles,
    })
}
