//! Columnar event store.
//!
//! The rest of the crate sees input files only through [`EventFile`]: a file
//! answers "do you hold table `name`?" by key lookup (no data is read), and
//! streams a named table as Arrow [`RecordBatch`]es on request.
//!
//! Two backends are provided:
//! - [`ParquetEventFile`]: one Parquet file holding one table, whose name is
//!   recorded in the file's key-value metadata under [`TABLE_NAME_KEY`].
//! - [`MemoryFile`]: tables built from in-memory batches (embedding, tests).

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

mod error;
mod memory;
mod parquet;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryFile;
pub use self::parquet::{ParquetEventFile, TABLE_NAME_KEY};

/// Batch stream over one table of one file.
pub type BatchIter = Box<dyn Iterator<Item = StoreResult<RecordBatch>>>;

/// Schema and row count of a table, known without reading row data.
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Table name as declared by the file.
    pub name: String,
    /// Arrow schema of the table.
    pub schema: SchemaRef,
    /// Number of rows, taken from file metadata.
    pub num_rows: u64,
}

/// An opened input file of the event store.
pub trait EventFile: fmt::Debug {
    /// Path the file was opened from (used in messages).
    fn path(&self) -> &Path;

    /// Look up table `name` without reading any rows.
    fn table(&self, name: &str) -> Option<&TableInfo>;

    /// Stream the rows of table `name` in batches of at most `batch_size` rows.
    fn read_table(&self, name: &str, batch_size: usize) -> StoreResult<BatchIter>;
}

/// Open `path` with the Parquet backend.
///
/// Any failure here (missing file, not a Parquet file, corrupt footer) is a
/// startup error for the caller.
pub fn open_file(path: &Path) -> StoreResult<Arc<dyn EventFile>> {
    let file = ParquetEventFile::open(path)?;
    Ok(Arc::new(file))
}
