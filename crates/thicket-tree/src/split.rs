//! Numeric feature splitter.

use rand::Rng;

use crate::class_set::{ClassSet, Side, SplitSets};
use crate::criterion::{CutPoint, ScanPoint, SplitCriterion, find_cut};
use crate::node::FeatureIndex;

/// The winning numeric split for a node.
#[derive(Debug)]
pub(crate) struct NumericSplit {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) children: SplitSets,
}

/// Find the best threshold split among a random subset of feature columns.
///
/// Draws up to `n_candidates` feature indices via partial Fisher-Yates,
/// scans each candidate's `(value, class, weight)` points with
/// [`find_cut`], and keeps the globally best cut (largest gain, ties broken
/// by the larger value gap). NaN feature values are excluded from the scan
/// and partitioned into the missing child.
///
/// `features` is row-major: `features[sample_idx][feature_idx]`; the class
/// set's example indices address its rows.
///
/// Returns `None` when no candidate produced an informative cut.
pub(crate) fn find_numeric_split(
    features: &[Vec<f64>],
    set: &ClassSet,
    n_candidates: usize,
    criterion: SplitCriterion,
    min_leaf_weight: f64,
    rng: &mut impl Rng,
) -> Option<NumericSplit> {
    let n_features = features[0].len();

    // Partial Fisher-Yates: shuffle only the first `n_candidates` positions.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = n_candidates.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }

    let mut best: Option<(FeatureIndex, CutPoint)> = None;
    let mut points: Vec<ScanPoint> = Vec::with_capacity(set.n_examples());

    for &feat_idx in &feature_order[..take] {
        points.clear();
        for (class, example) in set.iter() {
            let value = features[example.index][feat_idx];
            if value.is_nan() {
                continue;
            }
            points.push(ScanPoint {
                value,
                class,
                weight: example.weight,
            });
        }

        let Some(cut) = find_cut(&mut points, set.n_classes(), criterion, min_leaf_weight)
        else {
            continue;
        };

        if best.is_none_or(|(_, b)| cut.better_than(&b)) {
            best = Some((FeatureIndex::new(feat_idx), cut));
        }
    }

    let (feature, cut) = best?;
    let column = feature.index();
    let children = set.partition(|example| {
        let value = features[example.index][column];
        if value.is_nan() {
            Side::Missing
        } else if value <= cut.threshold {
            Side::Left
        } else {
            Side::Right
        }
    });

    Some(NumericSplit {
        feature,
        threshold: cut.threshold,
        children,
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn separable_data_finds_correct_split() {
        let features = vec![
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![10.0],
            vec![11.0],
            vec![12.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let set = ClassSet::from_labels(&labels, 2).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = find_numeric_split(&features, &set, 1, SplitCriterion::Entropy, 1.0, &mut rng)
            .expect("should find a split");
        assert_eq!(split.feature.index(), 0);
        assert!(split.threshold > 3.0 && split.threshold < 10.0);
        assert!((split.children.left.total_weight() - 3.0).abs() < f64::EPSILON);
        assert!((split.children.right.total_weight() - 3.0).abs() < f64::EPSILON);
        assert!(split.children.missing.is_none());
    }

    #[test]
    fn constant_feature_returns_none() {
        let features = vec![vec![5.0], vec![5.0], vec![5.0], vec![5.0]];
        let labels = vec![0, 0, 1, 1];
        let set = ClassSet::from_labels(&labels, 2).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split =
            find_numeric_split(&features, &set, 1, SplitCriterion::Entropy, 1.0, &mut rng);
        assert!(split.is_none());
    }

    #[test]
    fn nan_values_route_to_missing_child() {
        let features = vec![
            vec![1.0],
            vec![2.0],
            vec![f64::NAN],
            vec![10.0],
            vec![11.0],
        ];
        let labels = vec![0, 0, 0, 1, 1];
        let set = ClassSet::from_labels(&labels, 2).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = find_numeric_split(&features, &set, 1, SplitCriterion::Entropy, 1.0, &mut rng)
            .expect("should find a split");
        let missing = split.children.missing.expect("missing child must exist");
        assert_eq!(missing.n_examples(), 1);
        assert!((split.children.left.total_weight() - 2.0).abs() < f64::EPSILON);
        assert!((split.children.right.total_weight() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn min_leaf_weight_blocks_split() {
        let features = vec![vec![1.0], vec![10.0]];
        let labels = vec![0, 1];
        let set = ClassSet::from_labels(&labels, 2).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split =
            find_numeric_split(&features, &set, 1, SplitCriterion::Entropy, 2.0, &mut rng);
        assert!(split.is_none());
    }
}
