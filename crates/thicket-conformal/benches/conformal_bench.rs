use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use thicket_conformal::BootstrapConformalConfig;
use thicket_ensemble::{BaggingConfig, BaseModel};
use thicket_tree::DecisionTreeConfig;

fn bench_bootstrap_conformal(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut inputs = Vec::new();
    let mut labels = Vec::new();
    for _ in 0..300 {
        let class = rng.gen_range(0..2usize);
        inputs.push(vec![class as f64 * 2.0 + rng.r#gen::<f64>() * 4.0]);
        labels.push(class);
    }

    let bagging = BaggingConfig::new(BaseModel::Decision(DecisionTreeConfig::new()))
        .with_n_members(30)
        .with_seed(42);
    let conformal = BootstrapConformalConfig::new(bagging)
        .fit(&inputs, &labels)
        .unwrap();

    c.bench_function("conformal_estimate_batch_300", |b| {
        b.iter(|| {
            let p = conformal.estimate_batch(black_box(&inputs)).unwrap();
            black_box(p)
        });
    });
}

criterion_group!(benches, bench_bootstrap_conformal);
criterion_main!(benches);
