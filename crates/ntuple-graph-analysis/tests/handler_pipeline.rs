use std::fs;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Float64Builder, Int32Array, Int32Builder, ListBuilder};
use arrow::record_batch::RecordBatch;
use ntuple_graph_analysis::{AnalysisHandler, AnalysisLoader};
use ntuple_graph_core::store::{EventFile, MemoryFile};
use ntuple_graph_core::{Pipeline, PipelineConfig};
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Rows of `(kf, energy)` particles, all along +z.
fn primary(rows: &[Vec<(i32, f64)>], weights: &[f64]) -> TestResult<RecordBatch> {
    let mut kf = ListBuilder::new(Int32Builder::new());
    let mut px = ListBuilder::new(Float64Builder::new());
    let mut py = ListBuilder::new(Float64Builder::new());
    let mut pz = ListBuilder::new(Float64Builder::new());
    let mut e = ListBuilder::new(Float64Builder::new());
    for row in rows {
        for (code, energy) in row {
            kf.values().append_value(*code);
            px.values().append_value(0.0);
            py.values().append_value(0.0);
            pz.values().append_value(*energy);
            e.values().append_value(*energy);
        }
        kf.append(true);
        px.append(true);
        py.append(true);
        pz.append(true);
        e.append(true);
    }
    let ids: ArrayRef = Arc::new(Int32Array::from_iter_values(0..rows.len() as i32));
    let counts: ArrayRef = Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.len() as i32)));
    Ok(RecordBatch::try_from_iter(vec![
        ("id", ids),
        ("nparticle", counts),
        ("kf", Arc::new(kf.finish()) as ArrayRef),
        ("px", Arc::new(px.finish()) as ArrayRef),
        ("py", Arc::new(py.finish()) as ArrayRef),
        ("pz", Arc::new(pz.finish()) as ArrayRef),
        ("E", Arc::new(e.finish()) as ArrayRef),
        ("weight", Arc::new(Float64Array::from(weights.to_vec())) as ArrayRef),
    ])?)
}

#[test]
fn pipeline_feeds_descriptor_and_builtin_analyses() -> TestResult {
    let tmp = TempDir::new()?;
    fs::write(
        tmp.path().join("PHOTON_E.json"),
        r#"{ "name": "PHOTON_E", "observable": "energy", "bins": 4, "min": 0, "max": 40, "pdg_id": 22 }"#,
    )?;

    let rows = vec![
        vec![(22, 5.0), (211, 15.0)],
        vec![(22, 25.0), (22, 35.0), (22, 45.0)],
        vec![],
    ];
    let batch = primary(&rows, &[1.0, 2.0, 4.0])?;
    let file: Arc<dyn EventFile> =
        Arc::new(MemoryFile::new("events").with_table("t3", batch.schema(), vec![batch]));

    let mut handler = AnalysisHandler::new(AnalysisLoader::new(vec![tmp.path().to_path_buf()]));
    handler.add_analysis("PHOTON_E")?;
    handler.add_analysis("MC_XS")?;
    handler.add_analysis("MC_MULTIPLICITY")?;

    let output = tmp.path().join("out.json");
    let mut pipeline = Pipeline::new(PipelineConfig {
        show_progress: false,
        ..PipelineConfig::default()
    });
    pipeline.open_files(vec![file])?;
    pipeline.classify()?;
    assert_eq!(pipeline.stream(&mut handler)?, 3);
    pipeline.finish(&mut handler, &output)?;

    let doc: serde_json::Value = serde_json::from_slice(&fs::read(&output)?)?;
    assert_eq!(doc["events"], 3);
    assert_eq!(doc["weights"], serde_json::json!(["weight"]));

    let photon = &doc["analyses"][0]["histograms"][0]["per_weight"][0];
    assert_eq!(photon["sumw"], serde_json::json!([1.0, 0.0, 2.0, 2.0]));
    assert_eq!(photon["overflow"], 2.0);

    let xs = &doc["analyses"][1]["counters"][0]["per_weight"][0];
    assert_eq!(xs["sumw"], 7.0);
    assert_eq!(xs["entries"], 3);

    let mult = &doc["analyses"][2]["histograms"][0]["per_weight"][0]["sumw"];
    assert_eq!(mult[0], 4.0);
    assert_eq!(mult[2], 1.0);
    assert_eq!(mult[3], 2.0);
    Ok(())
}
