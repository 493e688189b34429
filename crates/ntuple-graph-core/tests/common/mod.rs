#![allow(dead_code)]

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float32Builder, Float64Array, Float64Builder, Int32Array, Int32Builder, ListBuilder,
};
use arrow::record_batch::RecordBatch;
use ntuple_graph_core::store::TABLE_NAME_KEY;
use ntuple_graph_core::{AnalysisEngine, EventGraph};
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// One primary-table row: `(kf, px, py, pz, E)` per particle.
#[derive(Debug, Clone)]
pub struct Row {
    pub id: i32,
    pub particles: Vec<(i32, [f64; 4])>,
    pub weight: f64,
}

impl Row {
    pub fn new(id: i32, n: usize, weight: f64) -> Self {
        let particles = (0..n)
            .map(|i| {
                let k = (i + 1) as f64;
                (if i % 2 == 0 { 211 } else { -211 }, [k, 0.0, -k, 2.0 * k])
            })
            .collect();
        Self {
            id,
            particles,
            weight,
        }
    }
}

fn momentum_column(rows: &[Row], c: usize, narrow: bool) -> ArrayRef {
    if narrow {
        let mut b = ListBuilder::new(Float32Builder::new());
        for row in rows {
            for (_, p) in &row.particles {
                b.values().append_value(p[c] as f32);
            }
            b.append(true);
        }
        Arc::new(b.finish())
    } else {
        let mut b = ListBuilder::new(Float64Builder::new());
        for row in rows {
            for (_, p) in &row.particles {
                b.values().append_value(p[c]);
            }
            b.append(true);
        }
        Arc::new(b.finish())
    }
}

pub fn primary_batch(rows: &[Row], narrow: bool, inline_weight: bool) -> TestResult<RecordBatch> {
    let mut kf = ListBuilder::new(Int32Builder::new());
    for row in rows {
        for (code, _) in &row.particles {
            kf.values().append_value(*code);
        }
        kf.append(true);
    }

    let mut columns: Vec<(&str, ArrayRef)> = vec![
        ("id", Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.id)))),
        (
            "nparticle",
            Arc::new(Int32Array::from_iter_values(
                rows.iter().map(|r| r.particles.len() as i32),
            )),
        ),
        ("kf", Arc::new(kf.finish())),
        ("px", momentum_column(rows, 0, narrow)),
        ("py", momentum_column(rows, 1, narrow)),
        ("pz", momentum_column(rows, 2, narrow)),
        ("E", momentum_column(rows, 3, narrow)),
    ];
    if inline_weight {
        columns.push((
            "weight",
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.weight))),
        ));
    }
    Ok(RecordBatch::try_from_iter(columns)?)
}

pub fn weights_batch(columns: &[(&str, Vec<f64>)]) -> TestResult<RecordBatch> {
    let arrays = columns.iter().map(|(name, values)| {
        let array: ArrayRef = Arc::new(Float64Array::from(values.clone()));
        (*name, array)
    });
    Ok(RecordBatch::try_from_iter(arrays)?)
}

pub fn write_table(path: &Path, table: &str, batch: &RecordBatch) -> TestResult<PathBuf> {
    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(vec![KeyValue::new(
            TABLE_NAME_KEY.to_string(),
            table.to_string(),
        )]))
        .build();
    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(path.to_path_buf())
}

/// What the recording engine saw for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub event_number: i64,
    pub final_state: usize,
    pub weights: Vec<(String, f64)>,
}

/// Engine that records every call.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub seen: Vec<Seen>,
    pub finalize_calls: usize,
    pub written: std::cell::RefCell<Vec<PathBuf>>,
}

impl AnalysisEngine for RecordingEngine {
    type Error = Infallible;

    fn analyze(&mut self, event: &EventGraph) -> Result<(), Infallible> {
        self.seen.push(Seen {
            event_number: event.event_number(),
            final_state: event.final_state().count(),
            weights: event
                .weights()
                .iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        });
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), Infallible> {
        self.finalize_calls += 1;
        Ok(())
    }

    fn write_output(&self, path: &Path) -> Result<(), Infallible> {
        self.written.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}
