use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use thicket_pattern::PatternTreeConfig;

fn bench_pattern_tree_fit(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut sequences = Vec::new();
    let mut labels = Vec::new();
    for i in 0..200 {
        let base = if i % 2 == 0 { 0.0 } else { 3.0 };
        let sequence: Vec<f64> = (0..100).map(|_| base + rng.r#gen::<f64>()).collect();
        sequences.push(sequence);
        labels.push(i % 2);
    }

    c.bench_function("pattern_tree_fit_200x100", |b| {
        b.iter(|| {
            let tree = PatternTreeConfig::new()
                .with_n_patterns(20)
                .with_max_pattern_len(Some(20))
                .with_seed(42)
                .fit(black_box(&sequences), black_box(&labels))
                .unwrap();
            black_box(tree)
        });
    });
}

criterion_group!(benches, bench_pattern_tree_fit);
criterion_main!(benches);
