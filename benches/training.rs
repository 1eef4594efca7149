use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use perfscore::inference::{InferenceConfig, InferenceEngine};
use perfscore::optimizer::{HyperparameterConfig, OptimizationConfig, ParameterValue, SearchSpace};
use perfscore::preprocessing::{FeatureSchemaReconciler, ReconcileConfig};
use perfscore::training::{CrossValidationSplitter, ModelEvaluator, TrainEngine, TrainingConfig};
use perfscore::utils::ParallelConfig;
use polars::prelude::*;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

fn create_candidates(n_rows: usize, n_features: usize) -> DataFrame {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);

    let mut columns: Vec<Column> = vec![Column::new(
        "CandidateID".into(),
        (0..n_rows).map(|i| format!("c{:06}", i)).collect::<Vec<_>>(),
    )];
    let mut signal = vec![0.0; n_rows];
    for f in 0..n_features {
        let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect();
        for (s, v) in signal.iter_mut().zip(&values) {
            *s += v;
        }
        columns.push(Column::new(format!("feature_{}", f).into(), values));
    }
    let industries = ["Retail", "IT", "Banking", "Energy"];
    columns.push(Column::new(
        "Industry".into(),
        (0..n_rows).map(|_| industries[rng.gen_range(0..4)]).collect::<Vec<_>>(),
    ));

    let threshold = 5.0 * n_features as f64;
    let label: Vec<i64> = signal
        .iter()
        .map(|&s| i64::from(s + rng.gen::<f64>() * 4.0 > threshold))
        .collect();
    columns.push(Column::new("Performance".into(), label));

    DataFrame::new(columns).unwrap()
}

fn bench_fold_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation");
    group.sample_size(10);

    let params = HyperparameterConfig::new()
        .with("n_estimators", ParameterValue::Int(50))
        .with("max_depth", ParameterValue::Int(4));

    for n_rows in [500, 2000].iter() {
        let table = FeatureSchemaReconciler::default()
            .fit(&create_candidates(*n_rows, 10), None)
            .unwrap();
        let folds = CrossValidationSplitter::new(5).split(&table.dataset).unwrap();
        let evaluator = ModelEvaluator::new(42, &ParallelConfig::new()).unwrap();

        group.bench_with_input(BenchmarkId::new("trial", n_rows), &table.dataset, |b, ds| {
            b.iter(|| evaluator.evaluate(0, black_box(&params), ds, &folds).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let outcome = TrainEngine::new(
        ReconcileConfig::default(),
        TrainingConfig::new().with_search_space(SearchSpace::new().int("n_estimators", 50, 50, 1)),
        OptimizationConfig::new().with_n_trials(1),
    )
    .train(&create_candidates(2000, 10), None)
    .unwrap();
    let engine = InferenceEngine::new(
        InferenceConfig::default(),
        ReconcileConfig::default(),
        outcome.schema,
        outcome.model,
    )
    .unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let df = create_candidates(*n_rows, 10);
        group.bench_with_input(BenchmarkId::new("predict_table", n_rows), &df, |b, df| {
            b.iter(|| engine.predict_table(black_box(df)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fold_evaluation, bench_prediction);
criterion_main!(benches);
