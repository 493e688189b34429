//! Primary event table layout.
//!
//! One row per event: `id`, `nparticle`, species codes `kf`, momentum
//! arrays `px`/`py`/`pz`/`E` (each narrow or wide on its own), and an
//! optional `ncount` multiplicity hint.

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use serde::Deserialize;

use crate::field::{
    FieldResult, FloatListColumn, FloatListField, FloatSlice, IntColumn, IntField, IntListColumn,
    IntListField,
};
use crate::weights::FALLBACK_WEIGHT_COLUMN;

/// Column names of the primary table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Event id.
    pub id: String,
    /// Number of final-state particles.
    pub nparticle: String,
    /// PDG species codes.
    pub kf: String,
    /// Momentum x components.
    pub px: String,
    /// Momentum y components.
    pub py: String,
    /// Momentum z components.
    pub pz: String,
    /// Energies.
    pub energy: String,
    /// Optional multiplicity hint.
    pub ncount: String,
    /// Inline weight, read when no weights table is supplied.
    pub weight: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            nparticle: "nparticle".to_string(),
            kf: "kf".to_string(),
            px: "px".to_string(),
            py: "py".to_string(),
            pz: "pz".to_string(),
            energy: "E".to_string(),
            ncount: "ncount".to_string(),
            weight: FALLBACK_WEIGHT_COLUMN.to_string(),
        }
    }
}

/// Resolved primary-table columns.
#[derive(Debug, Clone)]
pub struct PrimaryLayout {
    id: IntField,
    nparticle: IntField,
    kf: IntListField,
    px: FloatListField,
    py: FloatListField,
    pz: FloatListField,
    energy: FloatListField,
    ncount: Option<IntField>,
}

impl PrimaryLayout {
    /// Resolve every required column of `table`; `ncount` may be absent.
    pub fn resolve(table: &str, schema: &Schema, names: &ColumnNames) -> FieldResult<Self> {
        Ok(Self {
            id: IntField::resolve(table, schema, &names.id)?,
            nparticle: IntField::resolve(table, schema, &names.nparticle)?,
            kf: IntListField::resolve(table, schema, &names.kf)?,
            px: FloatListField::resolve(table, schema, &names.px)?,
            py: FloatListField::resolve(table, schema, &names.py)?,
            pz: FloatListField::resolve(table, schema, &names.pz)?,
            energy: FloatListField::resolve(table, schema, &names.energy)?,
            ncount: IntField::resolve_optional(table, schema, &names.ncount)?,
        })
    }

    /// Capture all columns of `batch`.
    pub fn bind(&self, batch: &RecordBatch) -> FieldResult<PrimaryColumns> {
        Ok(PrimaryColumns {
            id: self.id.bind(batch)?,
            nparticle: self.nparticle.bind(batch)?,
            kf: self.kf.bind(batch)?,
            px: self.px.bind(batch)?,
            py: self.py.bind(batch)?,
            pz: self.pz.bind(batch)?,
            energy: self.energy.bind(batch)?,
            ncount: self.ncount.as_ref().map(|f| f.bind(batch)).transpose()?,
        })
    }
}

/// Primary-table columns bound to one batch.
#[derive(Debug, Clone)]
pub struct PrimaryColumns {
    id: IntColumn,
    nparticle: IntColumn,
    kf: IntListColumn,
    px: FloatListColumn,
    py: FloatListColumn,
    pz: FloatListColumn,
    energy: FloatListColumn,
    ncount: Option<IntColumn>,
}

impl PrimaryColumns {
    /// View of the event stored at `row` of the bound batch.
    pub fn row(&self, row: usize) -> PrimaryRow<'_> {
        PrimaryRow {
            id: self.id.get(row),
            nparticle: self.nparticle.get(row),
            kf: self.kf.row(row),
            px: self.px.row(row),
            py: self.py.row(row),
            pz: self.pz.row(row),
            energy: self.energy.row(row),
            ncount: self.ncount.as_ref().map(|c| c.get(row)),
        }
    }
}

/// One event record, borrowed from a bound batch.
///
/// The arrays are expected to hold at least `nparticle` entries; that is the
/// table writer's contract and is not re-checked here.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryRow<'a> {
    /// Event id.
    pub id: i32,
    /// Declared number of final-state particles.
    pub nparticle: i32,
    /// PDG species codes.
    pub kf: &'a [i32],
    /// Momentum x components.
    pub px: FloatSlice<'a>,
    /// Momentum y components.
    pub py: FloatSlice<'a>,
    /// Momentum z components.
    pub pz: FloatSlice<'a>,
    /// Energies.
    pub energy: FloatSlice<'a>,
    /// Multiplicity hint, when the table has one.
    pub ncount: Option<i32>,
}

impl PrimaryRow<'_> {
    /// Declared particle count, with negative values read as zero.
    pub fn particle_count(&self) -> usize {
        self.nparticle.max(0) as usize
    }
}
