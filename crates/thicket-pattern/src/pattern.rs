//! Sampled sub-sequence patterns.

use rand::Rng;

use thicket_tree::{ClassSet, Example};

/// How the elements of a sequence compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SequenceKind {
    /// Real-valued sequences; windows compare by Euclidean distance.
    Numeric,
    /// Category-coded sequences; windows compare by 0/1 indicator distance.
    Categorical,
}

/// A sub-sequence sampled from one training example.
///
/// Patterns act as split features: each example's scalar under a pattern is
/// its minimum sliding-window distance to the pattern values.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pattern {
    values: Vec<f64>,
    kind: SequenceKind,
    source_index: usize,
    start: usize,
}

impl Pattern {
    pub(crate) fn new(values: Vec<f64>, kind: SequenceKind, source_index: usize, start: usize) -> Self {
        Self {
            values,
            kind,
            source_index,
            start,
        }
    }

    /// Return the pattern values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Return the element comparison kind.
    #[must_use]
    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    /// Return the number of elements in the pattern.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return true if the pattern has no elements.
    ///
    /// Patterns sampled by the splitter are always non-empty; provided to
    /// satisfy the `len_without_is_empty` convention.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return the dataset index of the example this pattern was cut from.
    #[must_use]
    pub fn source_index(&self) -> usize {
        self.source_index
    }

    /// Return the offset of this pattern within its source sequence.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }
}

/// Cut one random pattern out of a randomly chosen class-set example.
///
/// Picks a donor example uniformly, then a length within
/// `[min_len, max_len]` clamped to the donor's sequence length, then a
/// uniform start offset.
pub(crate) fn sample_pattern(
    sequences: &[Vec<f64>],
    examples: &[(usize, Example)],
    kind: SequenceKind,
    min_len: usize,
    max_len: Option<usize>,
    rng: &mut impl Rng,
) -> Pattern {
    let (_, donor) = examples[rng.gen_range(0..examples.len())];
    let sequence = &sequences[donor.index];

    let hi = max_len.unwrap_or(sequence.len()).min(sequence.len());
    let lo = min_len.min(hi);
    let length = rng.gen_range(lo..=hi);
    let start = rng.gen_range(0..=sequence.len() - length);

    Pattern::new(
        sequence[start..start + length].to_vec(),
        kind,
        donor.index,
        start,
    )
}

/// Collect `(label, example)` pairs once so candidates can index uniformly.
pub(crate) fn collect_examples(set: &ClassSet) -> Vec<(usize, Example)> {
    set.iter().collect()
}
