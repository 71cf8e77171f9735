//! Sliding-window distances between a sequence and a pattern.
//!
//! Both variants slide the pattern across every alignment of the sequence
//! and keep the minimum window distance, abandoning a window as soon as its
//! partial cost can no longer beat the best window found so far. The
//! abandoning is exact: the returned value always equals the exhaustive
//! minimum.

use crate::pattern::{Pattern, SequenceKind};

/// Compute the minimum sliding-window distance from `sequence` to `pattern`.
///
/// Numeric patterns use Euclidean window distance; categorical patterns use
/// the mean 0/1 indicator distance over the window. Returns NaN when the
/// sequence is shorter than the pattern — the scalar is undefined and the
/// example belongs to the missing partition.
#[must_use]
pub fn min_window_distance(sequence: &[f64], pattern: &Pattern) -> f64 {
    if sequence.len() < pattern.len() {
        return f64::NAN;
    }
    match pattern.kind() {
        SequenceKind::Numeric => min_euclidean(sequence, pattern.values()),
        SequenceKind::Categorical => min_indicator(sequence, pattern.values()),
    }
}

/// Minimum Euclidean window distance with early abandoning on the squared
/// accumulator.
fn min_euclidean(sequence: &[f64], values: &[f64]) -> f64 {
    let mut best_sq = f64::INFINITY;

    'windows: for start in 0..=sequence.len() - values.len() {
        let mut acc = 0.0;
        for (i, &v) in values.iter().enumerate() {
            let d = sequence[start + i] - v;
            acc += d * d;
            if acc >= best_sq {
                continue 'windows;
            }
        }
        best_sq = acc;
    }

    best_sq.sqrt()
}

/// Minimum mean indicator distance with early abandoning on the mismatch
/// count.
fn min_indicator(sequence: &[f64], values: &[f64]) -> f64 {
    let len = values.len();
    let mut best_mismatches = usize::MAX;

    'windows: for start in 0..=sequence.len() - len {
        let mut mismatches = 0usize;
        for (i, &v) in values.iter().enumerate() {
            if sequence[start + i] != v {
                mismatches += 1;
                if mismatches >= best_mismatches {
                    continue 'windows;
                }
            }
        }
        best_mismatches = mismatches;
        if best_mismatches == 0 {
            break;
        }
    }

    best_mismatches as f64 / len as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    fn numeric(values: Vec<f64>) -> Pattern {
        Pattern::new(values, SequenceKind::Numeric, 0, 0)
    }

    fn categorical(values: Vec<f64>) -> Pattern {
        Pattern::new(values, SequenceKind::Categorical, 0, 0)
    }

    #[test]
    fn exact_subsequence_has_zero_distance() {
        let sequence = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let pattern = numeric(vec![2.0, 3.0]);
        assert!(min_window_distance(&sequence, &pattern).abs() < f64::EPSILON);
    }

    #[test]
    fn best_window_is_found() {
        // Windows: [0,0]->5, [0,3]->sqrt(10), [3,0]->4, [0,0]->5.
        let sequence = vec![0.0, 0.0, 3.0, 0.0, 0.0];
        let pattern = numeric(vec![3.0, 4.0]);
        let expected = (0.0f64 + 16.0).sqrt(); // window [3, 0]
        assert!((min_window_distance(&sequence, &pattern) - expected).abs() < 1e-12);
    }

    #[test]
    fn abandoning_matches_exhaustive_minimum() {
        let sequence: Vec<f64> = (0..40).map(|i| ((i * 7) % 13) as f64).collect();
        let values = vec![5.0, 12.0, 6.0, 0.0];
        let pattern = numeric(values.clone());

        let exhaustive = (0..=sequence.len() - values.len())
            .map(|s| {
                values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| (sequence[s + i] - v).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .fold(f64::INFINITY, f64::min);

        assert!((min_window_distance(&sequence, &pattern) - exhaustive).abs() < 1e-12);
    }

    #[test]
    fn short_sequence_is_undefined() {
        let pattern = numeric(vec![1.0, 2.0, 3.0]);
        assert!(min_window_distance(&[1.0, 2.0], &pattern).is_nan());
    }

    #[test]
    fn indicator_counts_mismatches() {
        let sequence = vec![1.0, 2.0, 1.0, 3.0];
        let pattern = categorical(vec![1.0, 3.0]);
        // Best window is [1, 3] at offset 2 — zero mismatches.
        assert!(min_window_distance(&sequence, &pattern).abs() < f64::EPSILON);

        let pattern = categorical(vec![2.0, 2.0]);
        // Best windows have one mismatch out of two positions.
        assert!((min_window_distance(&sequence, &pattern) - 0.5).abs() < f64::EPSILON);
    }
}
