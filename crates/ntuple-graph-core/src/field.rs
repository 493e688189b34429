//! Column accessors with widths resolved once at open time.
//!
//! Event tables store momenta and weights either as 32-bit ("narrow") or
//! 64-bit ("wide") floats, and which one is only known once the file is
//! open. Resolution inspects the table schema exactly once and records a
//! [`FloatWidth`]; binding a record batch then captures the column buffers
//! in a two-variant enum, so reading a value never re-inspects types.
//!
//! Resolution and binding are fallible; reading a bound column is not.

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Schema};
use snafu::prelude::*;

/// Errors from resolving or binding a column.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FieldError {
    /// The table has no column with this name.
    #[snafu(display("Table {table} has no column {column}"))]
    MissingColumn {
        /// Table searched.
        table: String,
        /// Column requested.
        column: String,
    },

    /// The column exists but has a type the accessor cannot read.
    #[snafu(display("Column {column} of table {table} has type {datatype}, expected {expected}"))]
    UnsupportedType {
        /// Table searched.
        table: String,
        /// Column requested.
        column: String,
        /// Declared type.
        datatype: DataType,
        /// What the accessor accepts.
        expected: &'static str,
    },
}

/// Result alias for column resolution and binding.
pub type FieldResult<T> = Result<T, FieldError>;

/// Stored width of a floating-point column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    /// 32-bit floats.
    Narrow,
    /// 64-bit floats.
    Wide,
}

impl FloatWidth {
    /// Width of a scalar float type, or `None` for anything else.
    pub fn of(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Float32 => Some(FloatWidth::Narrow),
            DataType::Float64 => Some(FloatWidth::Wide),
            _ => None,
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            FloatWidth::Narrow => "Float32",
            FloatWidth::Wide => "Float64",
        }
    }
}

/// A resolved column: which table, which column, where in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Table the column belongs to.
    pub table: String,
    /// Column name.
    pub column: String,
    /// Position of the column in the table schema.
    pub index: usize,
}

impl ColumnRef {
    fn resolve(table: &str, schema: &Schema, column: &str) -> FieldResult<(Self, DataType)> {
        let index = schema.index_of(column).map_err(|_| FieldError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })?;
        let data_type = schema.field(index).data_type().clone();
        let col = ColumnRef {
            table: table.to_string(),
            column: column.to_string(),
            index,
        };
        Ok((col, data_type))
    }

    fn unsupported(&self, datatype: &DataType, expected: &'static str) -> FieldError {
        FieldError::UnsupportedType {
            table: self.table.clone(),
            column: self.column.clone(),
            datatype: datatype.clone(),
            expected,
        }
    }
}

/// Float buffer captured from one record batch.
#[derive(Debug, Clone)]
enum FloatBuffer {
    Narrow(ScalarBuffer<f32>),
    Wide(ScalarBuffer<f64>),
}

impl FloatBuffer {
    fn bind(col: &ColumnRef, width: FloatWidth, array: &dyn Array) -> FieldResult<Self> {
        let buffer = match width {
            FloatWidth::Narrow => array
                .as_primitive_opt::<Float32Type>()
                .map(|a| FloatBuffer::Narrow(a.values().clone())),
            FloatWidth::Wide => array
                .as_primitive_opt::<Float64Type>()
                .map(|a| FloatBuffer::Wide(a.values().clone())),
        };
        buffer.ok_or_else(|| col.unsupported(array.data_type(), width.type_name()))
    }

    fn slice(&self, start: usize, end: usize) -> FloatSlice<'_> {
        match self {
            FloatBuffer::Narrow(v) => FloatSlice::Narrow(&v[start..end]),
            FloatBuffer::Wide(v) => FloatSlice::Wide(&v[start..end]),
        }
    }
}

/// Borrowed run of floats of either width, read as `f64`.
#[derive(Debug, Clone, Copy)]
pub enum FloatSlice<'a> {
    /// 32-bit values, widened on read.
    Narrow(&'a [f32]),
    /// 64-bit values.
    Wide(&'a [f64]),
}

impl FloatSlice<'_> {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            FloatSlice::Narrow(v) => v.len(),
            FloatSlice::Wide(v) => v.len(),
        }
    }

    /// True when there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value `i` widened to `f64`. Panics when `i` is out of range.
    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        match self {
            FloatSlice::Narrow(v) => f64::from(v[i]),
            FloatSlice::Wide(v) => v[i],
        }
    }

    /// Iterate all values as `f64`.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

/// Scalar float column (one value per row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatField {
    column: ColumnRef,
    width: FloatWidth,
}

impl FloatField {
    /// Resolve `column` of `table`; fails if absent or not `Float32`/`Float64`.
    pub fn resolve(table: &str, schema: &Schema, column: &str) -> FieldResult<Self> {
        let (column, data_type) = ColumnRef::resolve(table, schema, column)?;
        let width = FloatWidth::of(&data_type)
            .ok_or_else(|| column.unsupported(&data_type, "Float32 or Float64"))?;
        Ok(Self { column, width })
    }

    /// The resolved column.
    pub fn column(&self) -> &ColumnRef {
        &self.column
    }

    /// Width fixed at resolution.
    pub fn width(&self) -> FloatWidth {
        self.width
    }

    /// Capture this column's values from `batch`.
    pub fn bind(&self, batch: &RecordBatch) -> FieldResult<FloatColumn> {
        let values = FloatBuffer::bind(&self.column, self.width, batch.column(self.column.index))?;
        Ok(FloatColumn { values })
    }
}

/// Scalar float values of one batch.
#[derive(Debug, Clone)]
pub struct FloatColumn {
    values: FloatBuffer,
}

impl FloatColumn {
    /// Value at `row` as `f64`.
    #[inline]
    pub fn get(&self, row: usize) -> f64 {
        match &self.values {
            FloatBuffer::Narrow(v) => f64::from(v[row]),
            FloatBuffer::Wide(v) => v[row],
        }
    }
}

/// Variable-length float array column (one list per row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatListField {
    column: ColumnRef,
    width: FloatWidth,
}

impl FloatListField {
    /// Resolve `column` of `table`; it must be a list of `Float32` or `Float64`.
    pub fn resolve(table: &str, schema: &Schema, column: &str) -> FieldResult<Self> {
        let (column, data_type) = ColumnRef::resolve(table, schema, column)?;
        let width = match &data_type {
            DataType::List(item) => FloatWidth::of(item.data_type()),
            _ => None,
        }
        .ok_or_else(|| column.unsupported(&data_type, "List<Float32> or List<Float64>"))?;
        Ok(Self { column, width })
    }

    /// The resolved column.
    pub fn column(&self) -> &ColumnRef {
        &self.column
    }

    /// Width of the list items, fixed at resolution.
    pub fn width(&self) -> FloatWidth {
        self.width
    }

    /// Capture this column's offsets and values from `batch`.
    pub fn bind(&self, batch: &RecordBatch) -> FieldResult<FloatListColumn> {
        let array = batch.column(self.column.index);
        let list = array
            .as_list_opt::<i32>()
            .ok_or_else(|| self.column.unsupported(array.data_type(), "List"))?;
        let values = FloatBuffer::bind(&self.column, self.width, list.values().as_ref())?;
        Ok(FloatListColumn {
            offsets: list.offsets().clone(),
            values,
        })
    }
}

/// Float lists of one batch.
#[derive(Debug, Clone)]
pub struct FloatListColumn {
    offsets: OffsetBuffer<i32>,
    values: FloatBuffer,
}

impl FloatListColumn {
    /// The list stored at `row`.
    #[inline]
    pub fn row(&self, row: usize) -> FloatSlice<'_> {
        let start = self.offsets[row] as usize;
        let end = self.offsets[row + 1] as usize;
        self.values.slice(start, end)
    }
}

/// Scalar `Int32` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntField {
    column: ColumnRef,
}

impl IntField {
    /// Resolve `column` of `table`; it must be `Int32`.
    pub fn resolve(table: &str, schema: &Schema, column: &str) -> FieldResult<Self> {
        let (column, data_type) = ColumnRef::resolve(table, schema, column)?;
        ensure!(
            data_type == DataType::Int32,
            UnsupportedTypeSnafu {
                table: column.table.clone(),
                column: column.column.clone(),
                datatype: data_type,
                expected: "Int32",
            }
        );
        Ok(Self { column })
    }

    /// Like [`IntField::resolve`], but an absent column yields `Ok(None)`.
    pub fn resolve_optional(table: &str, schema: &Schema, column: &str) -> FieldResult<Option<Self>> {
        match Self::resolve(table, schema, column) {
            Ok(field) => Ok(Some(field)),
            Err(FieldError::MissingColumn { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The resolved column.
    pub fn column(&self) -> &ColumnRef {
        &self.column
    }

    /// Capture this column's values from `batch`.
    pub fn bind(&self, batch: &RecordBatch) -> FieldResult<IntColumn> {
        let array = batch.column(self.column.index);
        let values = array
            .as_primitive_opt::<Int32Type>()
            .ok_or_else(|| self.column.unsupported(array.data_type(), "Int32"))?;
        Ok(IntColumn {
            values: values.values().clone(),
        })
    }
}

/// Scalar `Int32` values of one batch.
#[derive(Debug, Clone)]
pub struct IntColumn {
    values: ScalarBuffer<i32>,
}

impl IntColumn {
    /// Value at `row`.
    #[inline]
    pub fn get(&self, row: usize) -> i32 {
        self.values[row]
    }
}

/// `List<Int32>` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntListField {
    column: ColumnRef,
}

impl IntListField {
    /// Resolve `column` of `table`; it must be `List<Int32>`.
    pub fn resolve(table: &str, schema: &Schema, column: &str) -> FieldResult<Self> {
        let (column, data_type) = ColumnRef::resolve(table, schema, column)?;
        match &data_type {
            DataType::List(item) if item.data_type() == &DataType::Int32 => Ok(Self { column }),
            _ => Err(column.unsupported(&data_type, "List<Int32>")),
        }
    }

    /// The resolved column.
    pub fn column(&self) -> &ColumnRef {
        &self.column
    }

    /// Capture this column's offsets and values from `batch`.
    pub fn bind(&self, batch: &RecordBatch) -> FieldResult<IntListColumn> {
        let array = batch.column(self.column.index);
        let list = array
            .as_list_opt::<i32>()
            .ok_or_else(|| self.column.unsupported(array.data_type(), "List<Int32>"))?;
        let values = list
            .values()
            .as_primitive_opt::<Int32Type>()
            .ok_or_else(|| self.column.unsupported(list.values().data_type(), "List<Int32>"))?;
        Ok(IntListColumn {
            offsets: list.offsets().clone(),
            values: values.values().clone(),
        })
    }
}

/// `List<Int32>` values of one batch.
#[derive(Debug, Clone)]
pub struct IntListColumn {
    offsets: OffsetBuffer<i32>,
    values: ScalarBuffer<i32>,
}

impl IntListColumn {
    /// The list stored at `row`.
    #[inline]
    pub fn row(&self, row: usize) -> &[i32] {
        let start = self.offsets[row] as usize;
        let end = self.offsets[row + 1] as usize;
        &self.values[start..end]
    }
}
