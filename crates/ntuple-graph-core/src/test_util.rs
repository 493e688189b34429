use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use arrow::array::{
    ArrayRef, Float32Array, Float32Builder, Float64Array, Float64Builder, Int32Array,
    Int32Builder, ListBuilder,
};
use arrow::record_batch::RecordBatch;
use indicatif::{ProgressDrawTarget, TermLike};
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::store::TABLE_NAME_KEY;

pub(crate) type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// A fake terminal recording every non-blank string drawn on it, in order.
///
/// It also implements `io::Write`, so a log subscriber can share it and
/// interleavings can be checked.
#[derive(Debug, Clone, Default)]
pub(crate) struct Screen(Arc<Mutex<Vec<String>>>);

impl Screen {
    pub(crate) fn target(&self) -> ProgressDrawTarget {
        ProgressDrawTarget::term_like(Box::new(self.clone()))
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.0.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn record(&self, s: &str) {
        if !s.trim().is_empty() {
            if let Ok(mut lines) = self.0.lock() {
                lines.push(s.to_string());
            }
        }
    }
}

impl TermLike for Screen {
    fn width(&self) -> u16 {
        120
    }

    fn move_cursor_up(&self, _n: usize) -> io::Result<()> {
        Ok(())
    }

    fn move_cursor_down(&self, _n: usize) -> io::Result<()> {
        Ok(())
    }

    fn move_cursor_right(&self, _n: usize) -> io::Result<()> {
        Ok(())
    }

    fn move_cursor_left(&self, _n: usize) -> io::Result<()> {
        Ok(())
    }

    fn write_line(&self, s: &str) -> io::Result<()> {
        self.record(s);
        Ok(())
    }

    fn write_str(&self, s: &str) -> io::Result<()> {
        self.record(s);
        Ok(())
    }

    fn clear_line(&self) -> io::Result<()> {
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for Screen {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.record(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct TestEvent {
    pub(crate) id: i32,
    pub(crate) kf: Vec<i32>,
    pub(crate) momenta: Vec<[f64; 4]>,
    pub(crate) weight: f64,
    pub(crate) ncount: i32,
}

impl TestEvent {
    /// `n` massless particles with distinct, exactly representable momenta.
    pub(crate) fn with_particles(id: i32, n: usize, weight: f64) -> Self {
        let momenta = (0..n)
            .map(|i| {
                let k = (i + 1) as f64;
                [0.5 * k, -0.25 * k, 2.0 * k, 3.0 * k]
            })
            .collect();
        let kf = (0..n)
            .map(|i| if i % 2 == 0 { 22 } else { 211 })
            .collect();
        Self {
            id,
            kf,
            momenta,
            weight,
            ncount: 100 + id,
        }
    }
}

fn float_list(events: &[TestEvent], component: usize, narrow: bool) -> ArrayRef {
    if narrow {
        let mut b = ListBuilder::new(Float32Builder::new());
        for ev in events {
            for p in &ev.momenta {
                b.values().append_value(p[component] as f32);
            }
            b.append(true);
        }
        Arc::new(b.finish())
    } else {
        let mut b = ListBuilder::new(Float64Builder::new());
        for ev in events {
            for p in &ev.momenta {
                b.values().append_value(p[component]);
            }
            b.append(true);
        }
        Arc::new(b.finish())
    }
}

/// Primary-table batch with the standard `t3` columns and an inline `weight`.
pub(crate) fn primary_batch(events: &[TestEvent], narrow: bool) -> RecordBatch {
    primary_batch_with(events, narrow, true, true)
}

pub(crate) fn primary_batch_with(
    events: &[TestEvent],
    narrow: bool,
    with_weight: bool,
    with_ncount: bool,
) -> RecordBatch {
    let mut kf = ListBuilder::new(Int32Builder::new());
    for ev in events {
        kf.values().append_slice(&ev.kf);
        kf.append(true);
    }

    let mut columns: Vec<(&str, ArrayRef)> = vec![
        ("id", Arc::new(Int32Array::from_iter_values(events.iter().map(|e| e.id)))),
        (
            "nparticle",
            Arc::new(Int32Array::from_iter_values(
                events.iter().map(|e| e.momenta.len() as i32),
            )),
        ),
        ("kf", Arc::new(kf.finish())),
        ("px", float_list(events, 0, narrow)),
        ("py", float_list(events, 1, narrow)),
        ("pz", float_list(events, 2, narrow)),
        ("E", float_list(events, 3, narrow)),
    ];
    if with_weight {
        let weights: ArrayRef = if narrow {
            Arc::new(Float32Array::from_iter_values(
                events.iter().map(|e| e.weight as f32),
            ))
        } else {
            Arc::new(Float64Array::from_iter_values(events.iter().map(|e| e.weight)))
        };
        columns.push(("weight", weights));
    }
    if with_ncount {
        columns.push((
            "ncount",
            Arc::new(Int32Array::from_iter_values(events.iter().map(|e| e.ncount))),
        ));
    }

    RecordBatch::try_from_iter(columns).expect("valid primary batch")
}

/// Companion batch with one wide float column per `(name, values)`.
pub(crate) fn weights_batch(columns: &[(&str, &[f64])]) -> RecordBatch {
    RecordBatch::try_from_iter(columns.iter().map(|(name, values)| {
        let arr: ArrayRef = Arc::new(Float64Array::from(values.to_vec()));
        (*name, arr)
    }))
    .expect("valid weights batch")
}

pub(crate) fn write_batch_parquet(
    path: &Path,
    table: Option<&str>,
    batch: &RecordBatch,
) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut props = WriterProperties::builder();
    if let Some(name) = table {
        props = props.set_key_value_metadata(Some(vec![KeyValue::new(
            TABLE_NAME_KEY.to_string(),
            name.to_string(),
        )]));
    }

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props.build()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

pub(crate) fn write_primary_parquet(
    path: &Path,
    table: Option<&str>,
    narrow: bool,
    events: &[TestEvent],
) -> TestResult {
    write_batch_parquet(path, table, &primary_batch(events, narrow))
}
