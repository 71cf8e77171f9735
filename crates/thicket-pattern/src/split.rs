//! Pattern splitter: candidate sampling, distance scans, and ranking.

use rand::Rng;

use thicket_tree::{ClassSet, CutPoint, ScanPoint, Side, SplitCriterion, SplitSets, find_cut};

use crate::distance::min_window_distance;
use crate::pattern::{Pattern, SequenceKind, collect_examples, sample_pattern};

/// Statistic used to rank candidate patterns against each other.
///
/// The distance cutoff of the winning pattern always comes from the
/// information-gain scan; the ranking only decides which candidate wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PatternRanking {
    /// Rank by information gain, ties broken by the larger value gap.
    InfoGain,
    /// Rank by the F-statistic of the per-class distance samples.
    FStat,
}

/// The winning pattern split for a node.
#[derive(Debug)]
pub(crate) struct PatternSplit {
    pub(crate) pattern: Pattern,
    pub(crate) cutoff: f64,
    pub(crate) class_distances: Vec<f64>,
    pub(crate) children: SplitSets,
}

/// Parameters threaded from the tree config into the splitter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PatternSplitParams {
    pub(crate) n_patterns: usize,
    pub(crate) kind: SequenceKind,
    pub(crate) ranking: PatternRanking,
    pub(crate) criterion: SplitCriterion,
    pub(crate) min_pattern_len: usize,
    pub(crate) max_pattern_len: Option<usize>,
    pub(crate) min_leaf_weight: f64,
}

/// Find the best pattern split for a class set.
///
/// Samples `n_patterns` candidate sub-sequences; for each candidate,
/// computes every example's minimum window distance, scans the finite
/// distances with the shared threshold scan, and keeps the candidate the
/// configured ranking prefers. Examples whose distance is undefined
/// (sequence shorter than the pattern) are routed to the missing child.
///
/// Returns `None` when no candidate produced an informative cut.
pub(crate) fn find_pattern_split(
    sequences: &[Vec<f64>],
    set: &ClassSet,
    params: &PatternSplitParams,
    rng: &mut impl Rng,
) -> Option<PatternSplit> {
    let examples = collect_examples(set);

    let mut best: Option<(Pattern, CutPoint, f64, Vec<f64>)> = None;
    let mut points: Vec<ScanPoint> = Vec::with_capacity(examples.len());

    for _ in 0..params.n_patterns {
        let pattern = sample_pattern(
            sequences,
            &examples,
            params.kind,
            params.min_pattern_len,
            params.max_pattern_len,
            rng,
        );

        let distances: Vec<f64> = examples
            .iter()
            .map(|(_, example)| min_window_distance(&sequences[example.index], &pattern))
            .collect();

        points.clear();
        for (&(class, example), &value) in examples.iter().zip(&distances) {
            if value.is_nan() {
                continue;
            }
            points.push(ScanPoint {
                value,
                class,
                weight: example.weight,
            });
        }

        let Some(cut) = find_cut(
            &mut points,
            set.n_classes(),
            params.criterion,
            params.min_leaf_weight,
        ) else {
            continue;
        };

        let better = match (&best, params.ranking) {
            (None, _) => true,
            (Some((_, best_cut, _, _)), PatternRanking::InfoGain) => cut.better_than(best_cut),
            (Some((_, best_cut, best_f, _)), PatternRanking::FStat) => {
                let f = f_statistic(&examples, &distances, set.n_classes());
                f > *best_f || (f == *best_f && cut.better_than(best_cut))
            }
        };

        if better {
            let f = match params.ranking {
                PatternRanking::FStat => f_statistic(&examples, &distances, set.n_classes()),
                PatternRanking::InfoGain => 0.0,
            };
            best = Some((pattern, cut, f, distances));
        }
    }

    let (pattern, cut, _, distances) = best?;
    let class_distances = mean_class_distances(&examples, &distances, set.n_classes());

    let mut i = 0;
    let children = set.partition(|_| {
        let d = distances[i];
        i += 1;
        if d.is_nan() {
            Side::Missing
        } else if d <= cut.threshold {
            Side::Left
        } else {
            Side::Right
        }
    });

    Some(PatternSplit {
        pattern,
        cutoff: cut.threshold,
        class_distances,
        children,
    })
}

/// Weighted one-way ANOVA F-statistic of per-class distance samples.
///
/// Degenerate cases (a single class, zero within-class variance, or no
/// residual degrees of freedom) yield 0.0 — the statistic is a ranking
/// heuristic, not a gating precondition.
fn f_statistic(
    examples: &[(usize, thicket_tree::Example)],
    distances: &[f64],
    n_classes: usize,
) -> f64 {
    let mut class_weight = vec![0.0f64; n_classes];
    let mut class_sum = vec![0.0f64; n_classes];
    let mut total_weight = 0.0;
    let mut total_sum = 0.0;

    for (&(class, example), &d) in examples.iter().zip(distances) {
        if d.is_nan() {
            continue;
        }
        class_weight[class] += example.weight;
        class_sum[class] += example.weight * d;
        total_weight += example.weight;
        total_sum += example.weight * d;
    }

    let k = class_weight.iter().filter(|&&w| w > 0.0).count();
    if k < 2 || total_weight <= k as f64 {
        return 0.0;
    }
    let grand_mean = total_sum / total_weight;

    let mut between = 0.0;
    for class in 0..n_classes {
        if class_weight[class] > 0.0 {
            let mean = class_sum[class] / class_weight[class];
            between += class_weight[class] * (mean - grand_mean).powi(2);
        }
    }

    let mut within = 0.0;
    for (&(class, example), &d) in examples.iter().zip(distances) {
        if d.is_nan() {
            continue;
        }
        let mean = class_sum[class] / class_weight[class];
        within += example.weight * (d - mean).powi(2);
    }

    if within <= 0.0 {
        return 0.0;
    }

    (between / (k as f64 - 1.0)) / (within / (total_weight - k as f64))
}

/// Mean finite distance per class, 0.0 for classes with no defined distance.
fn mean_class_distances(
    examples: &[(usize, thicket_tree::Example)],
    distances: &[f64],
    n_classes: usize,
) -> Vec<f64> {
    let mut weight = vec![0.0f64; n_classes];
    let mut sum = vec![0.0f64; n_classes];
    for (&(class, example), &d) in examples.iter().zip(distances) {
        if d.is_nan() {
            continue;
        }
        weight[class] += example.weight;
        sum[class] += example.weight * d;
    }
    (0..n_classes)
        .map(|c| if weight[c] > 0.0 { sum[c] / weight[c] } else { 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn params(n_patterns: usize) -> PatternSplitParams {
        PatternSplitParams {
            n_patterns,
            kind: SequenceKind::Numeric,
            ranking: PatternRanking::InfoGain,
            criterion: SplitCriterion::Entropy,
            min_pattern_len: 2,
            max_pattern_len: Some(4),
            min_leaf_weight: 1.0,
        }
    }

    /// Class 1 sequences contain a high-amplitude bump that class 0 lacks.
    fn bump_dataset() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut sequences = Vec::new();
        let mut labels = Vec::new();
        for i in 0..8 {
            let mut flat = vec![0.0; 12];
            flat[i % 12] = 0.1;
            sequences.push(flat);
            labels.push(0);

            let mut bumped = vec![0.0; 12];
            let offset = i % 8;
            for (j, v) in [5.0, 6.0, 5.0].iter().enumerate() {
                bumped[offset + j] = *v;
            }
            sequences.push(bumped);
            labels.push(1);
        }
        (sequences, labels)
    }

    #[test]
    fn discriminative_pattern_separates_classes() {
        let (sequences, labels) = bump_dataset();
        let set = ClassSet::from_labels(&labels, 2).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = find_pattern_split(&sequences, &set, &params(100), &mut rng)
            .expect("a discriminative split must exist");

        assert!(split.children.left.total_weight() > 0.0);
        assert!(split.children.right.total_weight() > 0.0);
        assert!(split.children.missing.is_none());
        assert_eq!(split.class_distances.len(), 2);
        // The classes sit at clearly different mean distances to the pattern.
        assert!((split.class_distances[0] - split.class_distances[1]).abs() > 0.5);
    }

    #[test]
    fn single_class_yields_no_split() {
        let sequences = vec![vec![1.0, 2.0, 3.0, 4.0]; 4];
        let set = ClassSet::from_labels(&[0, 0, 0, 0], 1).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(find_pattern_split(&sequences, &set, &params(20), &mut rng).is_none());
    }

    #[test]
    fn short_sequences_route_to_missing() {
        // Patterns of length exactly 4 leave the two-step sequences without
        // a defined distance.
        let sequences = vec![
            vec![0.0, 0.0, 0.0, 0.0],
            vec![9.0, 9.0, 9.0, 9.0],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![9.0, 9.0, 9.0, 9.0],
            vec![5.0, 5.0],
        ];
        let labels = vec![0, 1, 0, 1, 0];
        let set = ClassSet::from_labels(&labels, 2).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let mut p = params(50);
        p.min_pattern_len = 4;
        p.max_pattern_len = Some(4);

        let split = find_pattern_split(&sequences, &set, &p, &mut rng)
            .expect("the long sequences still separate");
        let missing = split.children.missing.expect("short sequence must be missing");
        assert_eq!(missing.n_examples(), 1);
    }

    #[test]
    fn f_statistic_degenerate_is_zero() {
        let set = ClassSet::from_labels(&[0, 0], 1).unwrap();
        let examples = set.iter().collect::<Vec<_>>();
        assert_eq!(f_statistic(&examples, &[1.0, 2.0], 1), 0.0);
    }

    #[test]
    fn f_stat_ranking_also_separates() {
        let (sequences, labels) = bump_dataset();
        let set = ClassSet::from_labels(&labels, 2).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let mut p = params(100);
        p.ranking = PatternRanking::FStat;
        let split = find_pattern_split(&sequences, &set, &p, &mut rng)
            .expect("a discriminative split must exist");
        assert!(split.children.left.total_weight() > 0.0);
        assert!(split.children.right.total_weight() > 0.0);
    }
}
