//! Integration test: Full pipeline (CSV → train → persist → load → predict)

use perfscore::error::PerfError;
use perfscore::inference::{InferenceConfig, InferenceEngine};
use perfscore::optimizer::{OptimizationConfig, SearchSpace};
use perfscore::preprocessing::{FeatureSchemaReconciler, ReconcileConfig, Schema};
use perfscore::training::{TrainEngine, TrainedModel, TrainingConfig};
use perfscore::utils::DataLoader;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

fn training_csv(dir: &Path) -> PathBuf {
    let mut csv = String::from("CandidateID,Age,Tenure,Industry,Remote,Performance\n");
    for i in 0..60 {
        let tenure = ((i * 7) % 19) as f64 * 0.6;
        let industry = ["Retail", "IT", "Banking"][i % 3];
        let remote = if i % 2 == 0 { "true" } else { "false" };
        let label = u8::from(tenure > 5.0);
        writeln!(csv, "c{:03},{},{:.1},{},{},{}", i, 21 + i % 35, tenure, industry, remote, label).unwrap();
    }
    let path = dir.join("train.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn engine() -> TrainEngine {
    TrainEngine::new(
        ReconcileConfig::default(),
        TrainingConfig::new()
            .with_n_folds(3)
            .with_n_jobs(2)
            .with_search_space(SearchSpace::new().int("n_estimators", 5, 20, 5).int("max_depth", 2, 4, 1)),
        OptimizationConfig::new().with_n_trials(3).with_n_startup_trials(2),
    )
}

fn trained(dir: &Path) -> (PathBuf, PathBuf) {
    let df = DataLoader::new().load_csv(&training_csv(dir)).unwrap();
    let schema_path = dir.join("artifacts/schema.json");
    let model_path = dir.join("artifacts/model.json");
    engine().run(&df, None, &schema_path, &model_path).unwrap();
    (schema_path, model_path)
}

fn load(schema_path: &Path, model_path: &Path) -> InferenceEngine {
    InferenceEngine::load(InferenceConfig::default(), ReconcileConfig::default(), schema_path, model_path)
        .unwrap()
}

#[test]
fn test_train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let (schema_path, model_path) = trained(dir.path());
    let engine = load(&schema_path, &model_path);

    let input = dir.path().join("new.csv");
    std::fs::write(
        &input,
        "Remote,Industry,CandidateID,Tenure,Age,Notes\n\
         true,IT,n001,9.0,30,strong\n\
         false,Retail,n002,0.5,41,\n",
    )
    .unwrap();
    let df = DataLoader::new().load_csv(&input).unwrap();

    let batch = engine.predict_table(&df).unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.rejected.is_empty());
    assert!(batch.filled_features.is_empty());
    assert_eq!(batch.dropped_columns, vec!["Notes".to_string()]);
    assert_eq!(batch.predictions[0].candidate_id.as_str(), "N001");
    for p in &batch.predictions {
        assert!((p.class_0_probability + p.class_1_probability - 1.0).abs() < 1e-12);
    }

    let output = dir.path().join("predictions.csv");
    batch.write_csv(&output, "CandidateID").unwrap();
    let written = DataLoader::new().load_csv(&output).unwrap();
    assert_eq!(written.height(), 2);
    assert_eq!(written.width(), 4);
}

#[test]
fn test_missing_indicator_is_zero_filled() {
    let dir = tempfile::tempdir().unwrap();
    let (schema_path, model_path) = trained(dir.path());
    let engine = load(&schema_path, &model_path);

    let input = dir.path().join("new.csv");
    std::fs::write(&input, "CandidateID,Age,Tenure,Industry,Remote\nx1,30,2.0,IT,true\n").unwrap();
    let df = DataLoader::new().load_csv(&input).unwrap();

    let aligned = FeatureSchemaReconciler::default().reconcile(&df, engine.schema()).unwrap();
    let retail = engine.schema().position("industry_retail").unwrap();
    assert_eq!(aligned.vectors[0].values()[retail], 0.0);
    assert_eq!(aligned.vectors[0].len(), engine.schema().len());

    let batch = engine.predict_table(&df).unwrap();
    assert_eq!(batch.len(), 1);
    assert!(batch.rejected.is_empty());
}

#[test]
fn test_absent_columns_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (schema_path, model_path) = trained(dir.path());
    let engine = load(&schema_path, &model_path);

    let input = dir.path().join("new.csv");
    std::fs::write(&input, "Tenure,CandidateID\n6.5,y1\n1.0,y2\n").unwrap();
    let df = DataLoader::new().load_csv(&input).unwrap();

    let batch = engine.predict_table(&df).unwrap();
    assert_eq!(batch.len(), 2);
    for name in ["age", "industry_retail", "industry_banking", "industry_it", "remote"] {
        assert!(batch.filled_features.contains(&name.to_string()), "{} not filled", name);
    }
    assert!(!batch.filled_features.contains(&"tenure".to_string()));
}

#[test]
fn test_uncastable_value_rejects_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let (schema_path, model_path) = trained(dir.path());
    let engine = load(&schema_path, &model_path);

    let input = dir.path().join("new.csv");
    std::fs::write(
        &input,
        "CandidateID,Age,Tenure,Industry,Remote\n\
         a1,30,2.0,IT,true\n\
         a2,unknown,3.0,IT,true\n\
         a3,44,7.5,Banking,false\n",
    )
    .unwrap();
    let df = DataLoader::new().load_csv(&input).unwrap();

    let batch = engine.predict_table(&df).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].row, 1);
    assert!(matches!(batch.rejected[0].error, PerfError::SchemaMismatch(_)));
}

#[test]
fn test_model_from_other_schema_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (schema_path, model_path) = trained(dir.path());

    // Retrain on a table with an extra category so the schema moves on
    let df = DataLoader::new().load_csv(&training_csv(dir.path())).unwrap();
    let previous = Schema::load(&schema_path).unwrap();
    let mut df = df;
    let mut industry: Vec<&str> = vec!["IT"; df.height()];
    industry[0] = "Energy";
    df.with_column(polars::prelude::Column::new("Industry".into(), industry)).unwrap();
    let newer_schema = dir.path().join("schema_v2.json");
    let newer_model = dir.path().join("model_v2.json");
    engine().run(&df, Some(&previous), &newer_schema, &newer_model).unwrap();

    let result = InferenceEngine::load(
        InferenceConfig::default(),
        ReconcileConfig::default(),
        &newer_schema,
        &model_path,
    );
    assert!(matches!(result, Err(PerfError::ArtifactVersionMismatch { .. })));

    let model = TrainedModel::load(&newer_model).unwrap();
    assert_eq!(model.schema_revision(), 2);
}

#[test]
fn test_missing_id_column_fails_batch() {
    let dir = tempfile::tempdir().unwrap();
    let (schema_path, model_path) = trained(dir.path());
    let engine = load(&schema_path, &model_path);

    let input = dir.path().join("new.csv");
    std::fs::write(&input, "Age,Tenure\n30,2.0\n").unwrap();
    let df = DataLoader::new().load_csv(&input).unwrap();
    assert!(matches!(engine.predict_table(&df), Err(PerfError::SchemaMismatch(_))));
}
