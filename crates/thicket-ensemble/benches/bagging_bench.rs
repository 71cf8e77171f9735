use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use thicket_ensemble::{BaggingConfig, BaseModel};
use thicket_tree::DecisionTreeConfig;

fn bench_bagging_fit(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..500 {
        let class = i % 2;
        let row: Vec<f64> = (0..20)
            .map(|f| {
                if f < 4 {
                    class as f64 * 2.0 + rng.r#gen::<f64>()
                } else {
                    rng.r#gen::<f64>() * 5.0
                }
            })
            .collect();
        features.push(row);
        labels.push(class);
    }

    c.bench_function("bagging_fit_50x500x20", |b| {
        b.iter(|| {
            let base = BaseModel::Decision(DecisionTreeConfig::new().with_n_candidates(Some(4)));
            let result = BaggingConfig::new(base)
                .with_n_members(50)
                .with_seed(42)
                .fit(black_box(&features), black_box(&labels))
                .unwrap();
            black_box(result)
        });
    });
}

criterion_group!(benches, bench_bagging_fit);
criterion_main!(benches);
