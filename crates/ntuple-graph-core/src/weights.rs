//! Event weight discovery and per-row weight reading.
//!
//! Weights come from one of two places, decided once at open time:
//!
//! - a companion weight table, where every column is an independent weight
//!   stream (names and order taken from the table schema), joined to the
//!   primary table by row position;
//! - otherwise, a single inline column of the primary table named by
//!   convention (`weight`).
//!
//! Either way every row of a run yields the same ordered list of names.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use snafu::prelude::*;

use crate::classify::TableChain;
use crate::field::{FieldError, FieldResult, FloatColumn, FloatField};

/// Column read for the weight when no companion table is supplied.
pub const FALLBACK_WEIGHT_COLUMN: &str = "weight";

/// Errors from weight discovery.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WeightError {
    /// No companion table and the primary table lacks the fallback column.
    #[snafu(display(
        "No weights table supplied and the primary table has no usable {column} column: {source}"
    ))]
    MissingFallback {
        /// Fallback column name.
        column: String,
        /// Why the column could not be used.
        source: FieldError,
    },

    /// A companion column is not a floating-point column.
    #[snafu(display("Weights table column cannot be used as a weight: {source}"))]
    CompanionColumn {
        /// Underlying resolution error.
        source: FieldError,
    },
}

/// Which table the weight columns are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSide {
    /// Inline in the primary table.
    Primary,
    /// In the row-aligned companion table.
    Companion,
}

/// Ordered weights of one row.
///
/// The name list is shared by every row of a run; only values change.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRow {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl WeightRow {
    /// An empty row for the given names.
    pub fn new(names: Arc<[String]>) -> Self {
        let values = Vec::with_capacity(names.len());
        Self { names, values }
    }

    /// A row with explicit values; `values` must match `names` in length.
    pub fn from_parts(names: Arc<[String]>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    /// Weight names, in stream order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Shared handle to the weight names.
    pub fn shared_names(&self) -> &Arc<[String]> {
        &self.names
    }

    /// Weight values, in stream order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of weights.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the row holds no weights.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the weight called `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = self.names.iter().position(|n| n == name)?;
        self.values.get(idx).copied()
    }

    /// `(name, value)` pairs in stream order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }

    /// Copy `other` into `self`, keeping the allocation.
    pub fn copy_from(&mut self, other: &WeightRow) {
        if !Arc::ptr_eq(&self.names, &other.names) {
            self.names = Arc::clone(&other.names);
        }
        self.values.clear();
        self.values.extend_from_slice(&other.values);
    }
}

impl Default for WeightRow {
    fn default() -> Self {
        Self::new(Arc::from(Vec::<String>::new()))
    }
}

/// Weight streams discovered at open time.
#[derive(Debug, Clone)]
pub struct WeightReconciler {
    names: Arc<[String]>,
    side: WeightSide,
    fields: Vec<FloatField>,
}

impl WeightReconciler {
    /// Discover weight streams.
    ///
    /// With a companion chain, every companion column becomes a stream in
    /// declared order. Without one, `fallback` is read from the primary
    /// chain; its absence is the one unrecoverable weight error.
    pub fn discover(
        primary: &TableChain,
        companion: Option<&TableChain>,
        fallback: &str,
    ) -> Result<Self, WeightError> {
        match companion {
            Some(chain) => {
                let schema = chain.schema();
                let fields = schema
                    .fields()
                    .iter()
                    .map(|f| FloatField::resolve(chain.name(), schema, f.name()))
                    .collect::<FieldResult<Vec<_>>>()
                    .context(CompanionColumnSnafu)?;
                let names = schema.fields().iter().map(|f| f.name().clone()).collect();
                Ok(Self {
                    names,
                    side: WeightSide::Companion,
                    fields,
                })
            }
            None => {
                let field = FloatField::resolve(primary.name(), primary.schema(), fallback)
                    .context(MissingFallbackSnafu { column: fallback })?;
                Ok(Self {
                    names: Arc::from(vec![fallback.to_string()]),
                    side: WeightSide::Primary,
                    fields: vec![field],
                })
            }
        }
    }

    /// Weight names, identical for every row.
    pub fn names(&self) -> &Arc<[String]> {
        &self.names
    }

    /// Which table's batches [`WeightReconciler::bind`] expects.
    pub fn side(&self) -> WeightSide {
        self.side
    }

    /// The resolved weight columns.
    pub fn fields(&self) -> &[FloatField] {
        &self.fields
    }

    /// A row buffer sized for these streams.
    pub fn new_row(&self) -> WeightRow {
        WeightRow::new(Arc::clone(&self.names))
    }

    /// Capture the weight columns of `batch`, taken from [`Self::side`].
    pub fn bind(&self, batch: &RecordBatch) -> FieldResult<BoundWeights> {
        let columns = self
            .fields
            .iter()
            .map(|f| f.bind(batch))
            .collect::<FieldResult<Vec<_>>>()?;
        Ok(BoundWeights { columns })
    }
}

/// Weight columns bound to one batch.
#[derive(Debug, Clone)]
pub struct BoundWeights {
    columns: Vec<FloatColumn>,
}

impl BoundWeights {
    /// Overwrite `out` with the weights stored at `row` of the bound batch.
    pub fn read_into(&self, row: usize, out: &mut WeightRow) {
        out.values.clear();
        out.values.extend(self.columns.iter().map(|c| c.get(row)));
    }
}
