//! Row cursors over a chain of files.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::store::{BatchIter, EventFile, StoreResult};

/// Where a cursor stands after advancing.
#[derive(Debug, Clone, Copy)]
pub struct RowPos<'a> {
    /// Zero-based row index across the whole chain.
    pub position: u64,
    /// Row index inside `batch`.
    pub row: usize,
    /// True when this advance loaded a new batch; column views bound to the
    /// previous batch must be rebound.
    pub new_batch: bool,
    /// The batch holding the row.
    pub batch: &'a RecordBatch,
}

/// Sequential cursor over one table spread across several files.
///
/// Files are opened for reading lazily, one at a time, in chain order. The
/// cursor only moves forward.
pub struct ChainCursor {
    table: String,
    members: Vec<Arc<dyn EventFile>>,
    next_member: usize,
    batches: Option<BatchIter>,
    batch: Option<RecordBatch>,
    row: usize,
    position: Option<u64>,
    total: u64,
    batch_size: usize,
}

impl ChainCursor {
    pub(crate) fn new(
        table: String,
        members: Vec<Arc<dyn EventFile>>,
        total: u64,
        batch_size: usize,
    ) -> Self {
        Self {
            table,
            members,
            next_member: 0,
            batches: None,
            batch: None,
            row: 0,
            position: None,
            total,
            batch_size,
        }
    }

    /// Total rows in the chain, known before iteration starts.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Position of the current row, or `None` before the first advance.
    pub fn position(&self) -> Option<u64> {
        self.position
    }

    /// Move to the next row. Returns `Ok(None)` once the chain is exhausted.
    pub fn advance(&mut self) -> StoreResult<Option<RowPos<'_>>> {
        let mut new_batch = false;
        if self.batch.is_some() {
            self.row += 1;
        }

        while self
            .batch
            .as_ref()
            .is_none_or(|batch| self.row >= batch.num_rows())
        {
            match self.next_batch()? {
                Some(batch) => {
                    self.batch = Some(batch);
                    self.row = 0;
                    new_batch = true;
                }
                None => {
                    self.batch = None;
                    return Ok(None);
                }
            }
        }

        let position = self.position.map_or(0, |p| p + 1);
        self.position = Some(position);
        Ok(self.batch.as_ref().map(|batch| RowPos {
            position,
            row: self.row,
            new_batch,
            batch,
        }))
    }

    fn next_batch(&mut self) -> StoreResult<Option<RecordBatch>> {
        loop {
            if let Some(batches) = self.batches.as_mut() {
                match batches.next() {
                    Some(batch) => return batch.map(Some),
                    None => self.batches = None,
                }
            }

            let Some(file) = self.members.get(self.next_member) else {
                return Ok(None);
            };
            debug!(table = %self.table, path = %file.path().display(), "reading file");
            self.batches = Some(file.read_table(&self.table, self.batch_size)?);
            self.next_member += 1;
        }
    }
}
