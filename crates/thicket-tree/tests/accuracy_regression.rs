//! Accuracy regression tests for thicket-tree.
//!
//! These tests verify that algorithmic changes do not degrade decision-tree
//! classification accuracy on deterministic synthetic datasets.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use thicket_tree::{Classifier, DecisionTreeConfig, SplitCriterion};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic classification dataset
// ---------------------------------------------------------------------------

/// Generate a 300-sample, 10-feature, 3-class classification dataset.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]).
/// Features 3-9 are pure noise in [0, 0.5].
/// Samples are assigned round-robin across classes.
fn make_classification() -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n_samples = 300;
    let n_features = 10;
    let n_classes = 3;

    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(class);
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

fn training_accuracy(tree: &impl Classifier, features: &[Vec<f64>], labels: &[usize]) -> f64 {
    let correct = features
        .iter()
        .zip(labels)
        .filter(|&(sample, &label)| tree.predict(sample).unwrap() == label)
        .count();
    correct as f64 / labels.len() as f64
}

/// A fully grown tree must memorize the separable synthetic dataset.
#[test]
fn training_accuracy_is_perfect() {
    let (features, labels) = make_classification();
    let tree = DecisionTreeConfig::new()
        .with_seed(42)
        .fit(&features, &labels)
        .unwrap();
    let accuracy = training_accuracy(&tree, &features, &labels);
    assert!(
        (accuracy - 1.0).abs() < f64::EPSILON,
        "training accuracy {accuracy} < 1.0"
    );
}

/// Gini and entropy criteria must both separate the informative features.
#[test]
fn gini_matches_entropy_on_separable_data() {
    let (features, labels) = make_classification();
    for criterion in [SplitCriterion::Entropy, SplitCriterion::Gini] {
        let tree = DecisionTreeConfig::new()
            .with_criterion(criterion)
            .with_seed(42)
            .fit(&features, &labels)
            .unwrap();
        let accuracy = training_accuracy(&tree, &features, &labels);
        assert!(
            accuracy > 0.99,
            "{criterion:?} training accuracy {accuracy} <= 0.99"
        );
    }
}

/// Same config and seed must produce identical trees across runs, even when
/// each split examines a random feature subset.
#[test]
fn repeated_fits_are_identical() {
    let (features, labels) = make_classification();
    let config = DecisionTreeConfig::new()
        .with_n_candidates(Some(3))
        .with_seed(7);

    let tree1 = config.fit(&features, &labels).unwrap();
    let tree2 = config.fit(&features, &labels).unwrap();

    assert_eq!(tree1.n_nodes(), tree2.n_nodes());
    for sample in &features {
        assert_eq!(
            tree1.estimate(sample).unwrap(),
            tree2.estimate(sample).unwrap()
        );
    }
}

/// Training must terminate and stay exact when a noise feature column is
/// partially missing.
#[test]
fn missing_values_do_not_degrade_separable_accuracy() {
    let (mut features, labels) = make_classification();
    // Knock out a noise column for every fourth sample.
    for row in features.iter_mut().step_by(4) {
        row[5] = f64::NAN;
    }
    let tree = DecisionTreeConfig::new()
        .with_seed(42)
        .fit(&features, &labels)
        .unwrap();
    let accuracy = training_accuracy(&tree, &features, &labels);
    assert!(accuracy > 0.99, "training accuracy {accuracy} <= 0.99");
}
