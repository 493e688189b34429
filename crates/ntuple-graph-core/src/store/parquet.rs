//! Parquet backend.
//!
//! A Parquet file holds exactly one table. Its name lives in the footer's
//! key-value metadata under [`TABLE_NAME_KEY`]; files without that entry do
//! not match any table name and are ignored by classification.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parquet::arrow::arrow_reader::{
    ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReaderBuilder,
};
use parquet::file::metadata::FileMetaData;
use snafu::prelude::*;

use super::error::{OpenFileSnafu, ParquetReadSnafu, StoreError, StoreResult};
use super::{BatchIter, EventFile, TableInfo};

/// Key-value metadata entry naming the table a Parquet file holds.
pub const TABLE_NAME_KEY: &str = "ntuple.table";

/// A Parquet file whose footer has been parsed.
///
/// Opening reads only the footer. Row data is read from disk when
/// [`EventFile::read_table`] is called, and lives as long as the returned
/// batch stream.
#[derive(Debug)]
pub struct ParquetEventFile {
    path: PathBuf,
    metadata: ArrowReaderMetadata,
    table: Option<TableInfo>,
}

fn declared_table_name(meta: &FileMetaData) -> Option<String> {
    meta.key_value_metadata()?
        .iter()
        .find(|kv| kv.key == TABLE_NAME_KEY)
        .and_then(|kv| kv.value.clone())
}

impl ParquetEventFile {
    /// Parse the footer of `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let path_str = path.display().to_string();
        let file = File::open(path).context(OpenFileSnafu {
            path: path_str.clone(),
        })?;
        let metadata = ArrowReaderMetadata::load(&file, ArrowReaderOptions::default())
            .context(ParquetReadSnafu { path: path_str })?;

        let file_meta = metadata.metadata().file_metadata();
        let table = declared_table_name(file_meta).map(|name| TableInfo {
            name,
            schema: metadata.schema().clone(),
            num_rows: file_meta.num_rows().max(0) as u64,
        });

        Ok(Self {
            path: path.to_path_buf(),
            metadata,
            table,
        })
    }
}

impl EventFile for ParquetEventFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn table(&self, name: &str) -> Option<&TableInfo> {
        self.table.as_ref().filter(|t| t.name == name)
    }

    fn read_table(&self, name: &str, batch_size: usize) -> StoreResult<BatchIter> {
        let path = self.path.display().to_string();
        if self.table(name).is_none() {
            return Err(StoreError::TableMissing {
                path,
                table: name.to_string(),
            });
        }

        let data = fs::read(&self.path).context(OpenFileSnafu { path: path.clone() })?;
        let reader = ParquetRecordBatchReaderBuilder::new_with_metadata(
            Bytes::from(data),
            self.metadata.clone(),
        )
        .with_batch_size(batch_size.max(1))
        .build()
        .context(ParquetReadSnafu { path: path.clone() })?;

        let table = name.to_string();
        Ok(Box::new(reader.map(move |res| {
            res.map_err(|source| StoreError::ArrowRead {
                path: path.clone(),
                table: table.clone(),
                source,
            })
        })))
    }
}
