//! Split quality criterion and the shared threshold scan.
//!
//! Both tree flavors reduce a candidate (feature column or sampled pattern)
//! to one scalar per example and then search for the best binary cut of the
//! sorted scalars. The scan lives here so the pattern splitter reuses it.

use crate::class_set::ClassSet;

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
}

impl SplitCriterion {
    /// Compute the weighted impurity of a node from its per-class weights.
    ///
    /// Returns 0.0 when `total` is zero (empty node).
    #[must_use]
    pub fn impurity(&self, class_weights: &[f64], total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        match self {
            SplitCriterion::Entropy => -class_weights
                .iter()
                .filter(|&&w| w > 0.0)
                .map(|&w| {
                    let p = w / total;
                    p * p.ln()
                })
                .sum::<f64>(),
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_weights
                    .iter()
                    .map(|&w| {
                        let p = w / total;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
        }
    }
}

/// One example's scalar under a split candidate.
#[derive(Debug, Clone, Copy)]
pub struct ScanPoint {
    /// The candidate scalar (raw feature value, or distance to a pattern).
    pub value: f64,
    /// The example's class label.
    pub class: usize,
    /// The example's weight.
    pub weight: f64,
}

/// The best cut found by a threshold scan.
#[derive(Debug, Clone, Copy)]
pub struct CutPoint {
    /// Midpoint between the two adjacent distinct scalar values.
    pub threshold: f64,
    /// Information gain of the cut (parent impurity minus weighted child
    /// impurity).
    pub gain: f64,
    /// Gap between the adjacent distinct scalar values; tie-breaker.
    pub gap: f64,
}

/// Gains within this tolerance are considered tied and broken by gap.
const GAIN_EPS: f64 = 1e-12;

impl CutPoint {
    /// Compare two cuts: larger gain wins, tied gains prefer the larger gap.
    #[must_use]
    pub fn better_than(&self, other: &CutPoint) -> bool {
        if self.gain > other.gain + GAIN_EPS {
            return true;
        }
        (self.gain - other.gain).abs() <= GAIN_EPS && self.gap > other.gap
    }
}

/// Find the best binary cut of the given scan points.
///
/// Sorts by scalar value, then performs one left-to-right pass moving weight
/// from the right side to the left. Impurity is re-evaluated only at
/// boundaries where the scalar value changes and at least one class change
/// occurred since the previous evaluation; at every other position the cut
/// cannot improve on an already-evaluated one.
///
/// Points whose scalar is NaN must be excluded by the caller (they belong to
/// the missing partition and carry no ordering).
///
/// Returns `None` when no cut exists: fewer than two points, all values
/// identical, a single class, or every candidate cut leaves a child below
/// `min_child_weight`.
#[must_use]
pub fn find_cut(
    points: &mut [ScanPoint],
    n_classes: usize,
    criterion: SplitCriterion,
    min_child_weight: f64,
) -> Option<CutPoint> {
    if points.len() < 2 {
        return None;
    }
    points.sort_unstable_by(|a, b| a.value.total_cmp(&b.value));

    let mut parent = vec![0.0f64; n_classes];
    let mut total = 0.0;
    for p in points.iter() {
        parent[p.class] += p.weight;
        total += p.weight;
    }
    let parent_impurity = criterion.impurity(&parent, total);

    let mut left = vec![0.0f64; n_classes];
    let mut left_weight = 0.0;
    let mut right = parent;
    let mut right_weight = total;

    let mut class_changed = false;
    let mut best: Option<CutPoint> = None;

    for i in 0..points.len() - 1 {
        let point = points[i];
        left[point.class] += point.weight;
        left_weight += point.weight;
        right[point.class] -= point.weight;
        right_weight -= point.weight;

        if point.class != points[i + 1].class {
            class_changed = true;
        }

        let next_value = points[i + 1].value;
        if point.value == next_value || !class_changed {
            continue;
        }
        if left_weight < min_child_weight || right_weight < min_child_weight {
            continue;
        }

        let child_impurity = (left_weight * criterion.impurity(&left, left_weight)
            + right_weight * criterion.impurity(&right, right_weight))
            / total;
        let candidate = CutPoint {
            threshold: (point.value + next_value) / 2.0,
            gain: parent_impurity - child_impurity,
            gap: next_value - point.value,
        };
        class_changed = false;

        if best.is_none_or(|b| candidate.better_than(&b)) {
            best = Some(candidate);
        }
    }

    best
}

/// Compute the per-class weighted impurity of a whole class set.
#[must_use]
pub fn class_set_impurity(set: &ClassSet, criterion: SplitCriterion) -> f64 {
    let mut weights = vec![0.0f64; set.n_classes()];
    for sample in set.samples() {
        weights[sample.label()] = sample.weight();
    }
    criterion.impurity(&weights, set.total_weight())
}
