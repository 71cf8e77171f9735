//! Weighted per-class index of training examples.
//!
//! A [`ClassSet`] is the substrate every splitter operates on: it groups
//! example indices by class, carries a weight per example (bootstrap
//! replication without copying data), and is immutable once built. Split
//! operations produce new left/right/missing sets, never mutate the parent.

use crate::error::ModelError;

/// A weighted reference to one training example.
///
/// The index points into the caller-owned dataset; the weight counts how
/// often the example occurs (bootstrap draws) or how much it contributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Example {
    /// Zero-based index into the dataset.
    pub index: usize,
    /// Non-negative contribution weight.
    pub weight: f64,
}

/// The examples of a single class, in dataset order.
#[derive(Debug, Clone)]
pub struct Sample {
    label: usize,
    examples: Vec<Example>,
    weight: f64,
}

impl Sample {
    fn new(label: usize) -> Self {
        Self {
            label,
            examples: Vec::new(),
            weight: 0.0,
        }
    }

    fn push(&mut self, example: Example) {
        self.weight += example.weight;
        self.examples.push(example);
    }

    /// Return the class label of this sample.
    #[must_use]
    pub fn label(&self) -> usize {
        self.label
    }

    /// Return the examples of this sample, in dataset order.
    #[must_use]
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Return the summed weight of this sample's examples.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Which child a partitioned example belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The scalar was less than or equal to the cut.
    Left,
    /// The scalar was greater than the cut.
    Right,
    /// The scalar was undefined for this example.
    Missing,
}

/// Result of partitioning a [`ClassSet`] on a winning threshold.
#[derive(Debug)]
pub struct SplitSets {
    /// Examples whose scalar fell at or below the cut.
    pub left: ClassSet,
    /// Examples whose scalar fell above the cut.
    pub right: ClassSet,
    /// Examples whose scalar was undefined, when any existed.
    pub missing: Option<ClassSet>,
}

/// Weighted, per-class partition of training example indices.
///
/// Invariants, maintained by construction:
/// - `total_weight()` equals the sum of all sample weights;
/// - `target_count()` equals the number of distinct labels present;
/// - every example index is unique within the set.
#[derive(Debug, Clone)]
pub struct ClassSet {
    samples: Vec<Sample>,
    n_classes: usize,
    total_weight: f64,
}

impl ClassSet {
    /// Build a unit-weight class set over all labeled examples.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ModelError::EmptyDataset`] | `labels` is empty |
    /// | [`ModelError::LabelOutOfRange`] | any label is `>= n_classes` |
    pub fn from_labels(labels: &[usize], n_classes: usize) -> Result<Self, ModelError> {
        let weights = vec![1.0; labels.len()];
        Self::from_weights(labels, &weights, n_classes)
    }

    /// Build a class set from per-example bootstrap draw counts.
    ///
    /// Examples with a zero count are excluded entirely (they are
    /// out-of-bag for the member being built).
    ///
    /// # Errors
    ///
    /// Same conditions as [`ClassSet::from_labels`]; additionally
    /// [`ModelError::SizeMismatch`] when `counts.len() != labels.len()`,
    /// and [`ModelError::EmptyDataset`] when every count is zero.
    pub fn from_counts(
        labels: &[usize],
        counts: &[usize],
        n_classes: usize,
    ) -> Result<Self, ModelError> {
        if counts.len() != labels.len() {
            return Err(ModelError::SizeMismatch {
                inputs: counts.len(),
                labels: labels.len(),
            });
        }
        let weights: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        Self::from_weights(labels, &weights, n_classes)
    }

    fn from_weights(
        labels: &[usize],
        weights: &[f64],
        n_classes: usize,
    ) -> Result<Self, ModelError> {
        if labels.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        let mut builder = ClassSetBuilder::new(n_classes);
        for (index, (&label, &weight)) in labels.iter().zip(weights).enumerate() {
            if label >= n_classes {
                return Err(ModelError::LabelOutOfRange {
                    label,
                    n_classes,
                    sample_index: index,
                });
            }
            if weight > 0.0 {
                builder.push(label, Example { index, weight });
            }
        }
        // A set with no positive weight cannot anchor a tree: its
        // distribution would be all zeros.
        if builder.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        Ok(builder.build())
    }

    /// Return the size of the label domain.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the number of distinct labels present in this set.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.samples.len()
    }

    /// Return the summed weight of all examples.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Return the number of examples (not their summed weight).
    #[must_use]
    pub fn n_examples(&self) -> usize {
        self.samples.iter().map(|s| s.examples.len()).sum()
    }

    /// Return the per-class samples present in this set.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Return the single present class, if only one remains.
    #[must_use]
    pub fn single_class(&self) -> Option<usize> {
        match self.samples.as_slice() {
            [sample] => Some(sample.label),
            _ => None,
        }
    }

    /// Iterate `(label, example)` pairs across all classes.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Example)> + '_ {
        self.samples
            .iter()
            .flat_map(|s| s.examples.iter().map(|&e| (s.label, e)))
    }

    /// Return the normalized per-class weight distribution.
    ///
    /// The returned `Vec` has length `n_classes` and sums to 1.0 for any
    /// non-empty set.
    #[must_use]
    pub fn distribution(&self) -> Vec<f64> {
        let mut dist = vec![0.0; self.n_classes];
        for sample in &self.samples {
            dist[sample.label] = sample.weight / self.total_weight;
        }
        dist
    }

    /// Partition into left/right/missing sets by a per-example routing.
    ///
    /// Produces new sets; the parent is left untouched. The `missing` set is
    /// `None` when no example routed there.
    #[must_use]
    pub fn partition(&self, mut side: impl FnMut(&Example) -> Side) -> SplitSets {
        let mut left = ClassSetBuilder::new(self.n_classes);
        let mut right = ClassSetBuilder::new(self.n_classes);
        let mut missing = ClassSetBuilder::new(self.n_classes);

        for (label, example) in self.iter() {
            match side(&example) {
                Side::Left => left.push(label, example),
                Side::Right => right.push(label, example),
                Side::Missing => missing.push(label, example),
            }
        }

        SplitSets {
            left: left.build(),
            right: right.build(),
            missing: if missing.is_empty() {
                None
            } else {
                Some(missing.build())
            },
        }
    }
}

/// Accumulates examples per class, then freezes into a [`ClassSet`].
struct ClassSetBuilder {
    per_class: Vec<Option<Sample>>,
    total_weight: f64,
}

impl ClassSetBuilder {
    fn new(n_classes: usize) -> Self {
        Self {
            per_class: (0..n_classes).map(|_| None).collect(),
            total_weight: 0.0,
        }
    }

    fn push(&mut self, label: usize, example: Example) {
        self.total_weight += example.weight;
        self.per_class[label]
            .get_or_insert_with(|| Sample::new(label))
            .push(example);
    }

    fn is_empty(&self) -> bool {
        self.per_class.iter().all(Option::is_none)
    }

    fn build(self) -> ClassSet {
        let n_classes = self.per_class.len();
        ClassSet {
            samples: self.per_class.into_iter().flatten().collect(),
            n_classes,
            total_weight: self.total_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_weights_sum_to_example_count() {
        let labels = vec![0, 1, 0, 2, 1, 0];
        let set = ClassSet::from_labels(&labels, 3).unwrap();
        assert!((set.total_weight() - 6.0).abs() < f64::EPSILON);
        assert_eq!(set.n_examples(), 6);
        assert_eq!(set.target_count(), 3);
    }

    #[test]
    fn empty_labels_rejected() {
        let err = ClassSet::from_labels(&[], 2).unwrap_err();
        assert!(matches!(err, ModelError::EmptyDataset));
    }

    #[test]
    fn label_out_of_range_rejected() {
        let err = ClassSet::from_labels(&[0, 3], 2).unwrap_err();
        assert!(matches!(
            err,
            ModelError::LabelOutOfRange { label: 3, n_classes: 2, sample_index: 1 }
        ));
    }

    #[test]
    fn bootstrap_counts_become_weights() {
        let labels = vec![0, 0, 1, 1];
        let counts = vec![2, 0, 1, 3];
        let set = ClassSet::from_counts(&labels, &counts, 2).unwrap();
        assert!((set.total_weight() - 6.0).abs() < f64::EPSILON);
        // Example 1 was never drawn and must not appear.
        assert_eq!(set.n_examples(), 3);
        assert!(set.iter().all(|(_, e)| e.index != 1));
    }

    #[test]
    fn all_zero_counts_rejected() {
        let err = ClassSet::from_counts(&[0, 1, 0], &[0, 0, 0], 2).unwrap_err();
        assert!(matches!(err, ModelError::EmptyDataset));
    }

    #[test]
    fn counts_length_mismatch_rejected() {
        let err = ClassSet::from_counts(&[0, 1], &[1], 2).unwrap_err();
        assert!(matches!(err, ModelError::SizeMismatch { inputs: 1, labels: 2 }));
    }

    #[test]
    fn single_class_detected() {
        let set = ClassSet::from_labels(&[1, 1, 1], 3).unwrap();
        assert_eq!(set.single_class(), Some(1));
        assert_eq!(set.target_count(), 1);

        let mixed = ClassSet::from_labels(&[0, 1], 2).unwrap();
        assert_eq!(mixed.single_class(), None);
    }

    #[test]
    fn distribution_normalized_over_domain() {
        let set = ClassSet::from_labels(&[0, 0, 0, 2], 3).unwrap();
        let dist = set.distribution();
        assert_eq!(dist.len(), 3);
        assert!((dist[0] - 0.75).abs() < 1e-12);
        assert!((dist[1] - 0.0).abs() < 1e-12);
        assert!((dist[2] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn partition_preserves_total_weight() {
        let labels = vec![0, 1, 0, 1, 0];
        let set = ClassSet::from_labels(&labels, 2).unwrap();
        let split = set.partition(|e| if e.index < 2 { Side::Left } else { Side::Right });

        assert!((split.left.total_weight() - 2.0).abs() < f64::EPSILON);
        assert!((split.right.total_weight() - 3.0).abs() < f64::EPSILON);
        assert!(split.missing.is_none());
        // Parent untouched.
        assert!((set.total_weight() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partition_routes_missing() {
        let set = ClassSet::from_labels(&[0, 1, 0], 2).unwrap();
        let split = set.partition(|e| {
            if e.index == 1 {
                Side::Missing
            } else {
                Side::Left
            }
        });
        let missing = split.missing.expect("missing set must exist");
        assert_eq!(missing.n_examples(), 1);
        assert!((split.right.total_weight() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn iter_visits_every_example_once() {
        let labels = vec![2, 0, 1, 2];
        let set = ClassSet::from_labels(&labels, 3).unwrap();
        let mut seen: Vec<usize> = set.iter().map(|(_, e)| e.index).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
