//! In-memory backend.

use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use super::error::{StoreError, StoreResult};
use super::{BatchIter, EventFile, TableInfo};

/// A file whose tables live in memory.
///
/// Unlike a Parquet file, a `MemoryFile` may hold several tables, so one
/// file can contribute to both the primary and the companion chain.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    path: PathBuf,
    tables: Vec<(TableInfo, Vec<RecordBatch>)>,
}

impl MemoryFile {
    /// Create an empty file labelled `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tables: Vec::new(),
        }
    }

    /// Add table `name` made of `batches`, all of which must share `schema`.
    pub fn with_table(
        mut self,
        name: impl Into<String>,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Self {
        let num_rows = batches.iter().map(|b| b.num_rows() as u64).sum();
        let info = TableInfo {
            name: name.into(),
            schema,
            num_rows,
        };
        self.tables.push((info, batches));
        self
    }
}

impl EventFile for MemoryFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables
            .iter()
            .map(|(info, _)| info)
            .find(|info| info.name == name)
    }

    fn read_table(&self, name: &str, batch_size: usize) -> StoreResult<BatchIter> {
        let (_, batches) = self
            .tables
            .iter()
            .find(|(info, _)| info.name == name)
            .ok_or_else(|| StoreError::TableMissing {
                path: self.path.display().to_string(),
                table: name.to_string(),
            })?;

        // Re-chunk so callers see the same batch sizes as from Parquet.
        let batch_size = batch_size.max(1);
        let mut chunks = Vec::new();
        for batch in batches {
            let mut offset = 0;
            while offset < batch.num_rows() {
                let len = batch_size.min(batch.num_rows() - offset);
                chunks.push(Ok(batch.slice(offset, len)));
                offset += len;
            }
        }
        Ok(Box::new(chunks.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::weights_batch;

    #[test]
    fn holds_several_tables() {
        let batch = weights_batch(&[("w1", &[1.0, 2.0, 3.0])]);
        let file = MemoryFile::new("mem")
            .with_table("t3", batch.schema(), vec![batch.clone()])
            .with_table("weights", batch.schema(), vec![batch]);

        assert_eq!(file.table("t3").map(|t| t.num_rows), Some(3));
        assert_eq!(file.table("weights").map(|t| t.num_rows), Some(3));
        assert!(file.table("other").is_none());
    }

    #[test]
    fn read_table_rechunks_batches() -> Result<(), Box<dyn std::error::Error>> {
        let batch = weights_batch(&[("w1", &[1.0, 2.0, 3.0, 4.0, 5.0])]);
        let file = MemoryFile::new("mem").with_table("weights", batch.schema(), vec![batch]);

        let sizes: Vec<usize> = file
            .read_table("weights", 2)?
            .map(|b| b.map(|b| b.num_rows()))
            .collect::<Result<_, _>>()?;
        assert_eq!(sizes, vec![2, 2, 1]);
        Ok(())
    }
}
