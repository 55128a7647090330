use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use churn_predict::export::ModelArtifact;
use churn_predict::inference::{InferenceConfig, InferenceEngine};
use churn_predict::training::{TrainEngine, TrainingConfig};
use churn_predict::utils::{ChurnDataset, DataLoader, SampleDataGenerator};

fn create_churn_data(n_rows: usize) -> ChurnDataset {
    let raw = SampleDataGenerator::new(n_rows).generate().unwrap();
    DataLoader::new().load_frame(&raw).unwrap()
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [1000, 5000].iter() {
        let data = create_churn_data(*n_rows);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &data, |b, data| {
            b.iter(|| {
                let config = TrainingConfig::new().with_n_estimators(50);
                TrainEngine::new(config).train(black_box(data)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");

    // Train model once
    let data = create_churn_data(3000);
    let config = TrainingConfig::new().with_n_estimators(100);
    let outcome = TrainEngine::new(config.clone()).train(&data).unwrap();
    let engine = InferenceEngine::from_artifact(
        InferenceConfig::new(),
        ModelArtifact::from_training(&config, outcome),
    );
    let records = data.records().unwrap();

    group.bench_function("score_single", |b| {
        b.iter(|| engine.score(black_box(&records[0])).unwrap())
    });

    for n_rows in [100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("score_batch", n_rows),
            &records[..*n_rows],
            |b, batch| b.iter(|| engine.score_batch(black_box(batch)).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_scoring);
criterion_main!(benches);
