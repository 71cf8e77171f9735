use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use thicket_tree::{ClassSet, Classifier, MissingPolicy, ModelError, NodeIndex, SplitCriterion};

use crate::distance::min_window_distance;
use crate::pattern::{Pattern, SequenceKind};
use crate::split::{PatternRanking, PatternSplitParams, find_pattern_split};

/// Configuration for a single pattern tree.
///
/// Construct via [`PatternTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter         | Default                     |
/// |-------------------|-----------------------------|
/// | `n_patterns`      | 10                          |
/// | `kind`            | `Numeric`                   |
/// | `ranking`         | `InfoGain`                  |
/// | `criterion`       | `Entropy`                   |
/// | `min_pattern_len` | 2                           |
/// | `max_pattern_len` | `None` (full donor length)  |
/// | `max_depth`       | `None` (unlimited)          |
/// | `min_leaf_weight` | 1.0                         |
/// | `missing_policy`  | `MissingBranch`             |
/// | `seed`            | 42                          |
#[derive(Debug, Clone)]
pub struct PatternTreeConfig {
    pub(crate) n_patterns: usize,
    pub(crate) kind: SequenceKind,
    pub(crate) ranking: PatternRanking,
    pub(crate) criterion: SplitCriterion,
    pub(crate) min_pattern_len: usize,
    pub(crate) max_pattern_len: Option<usize>,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_leaf_weight: f64,
    pub(crate) missing_policy: MissingPolicy,
    pub(crate) seed: u64,
}

impl PatternTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_patterns: 10,
            kind: SequenceKind::Numeric,
            ranking: PatternRanking::InfoGain,
            criterion: SplitCriterion::Entropy,
            min_pattern_len: 2,
            max_pattern_len: None,
            max_depth: None,
            min_leaf_weight: 1.0,
            missing_policy: MissingPolicy::MissingBranch,
            seed: 42,
        }
    }

    /// Set the number of candidate patterns sampled per split.
    #[must_use]
    pub fn with_n_patterns(mut self, n_patterns: usize) -> Self {
        self.n_patterns = n_patterns;
        self
    }

    /// Set the element comparison kind for sequences and patterns.
    #[must_use]
    pub fn with_kind(mut self, kind: SequenceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the statistic used to rank candidate patterns.
    #[must_use]
    pub fn with_ranking(mut self, ranking: PatternRanking) -> Self {
        self.ranking = ranking;
        self
    }

    /// Set the split quality criterion for the cutoff scan.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the minimum sampled pattern length.
    #[must_use]
    pub fn with_min_pattern_len(mut self, min_pattern_len: usize) -> Self {
        self.min_pattern_len = min_pattern_len;
        self
    }

    /// Set the maximum sampled pattern length.
    ///
    /// `None` allows patterns up to the donor sequence length.
    #[must_use]
    pub fn with_max_pattern_len(mut self, max_pattern_len: Option<usize>) -> Self {
        self.max_pattern_len = max_pattern_len;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum weight below which a node becomes a leaf.
    #[must_use]
    pub fn with_min_leaf_weight(mut self, min_leaf_weight: f64) -> Self {
        self.min_leaf_weight = min_leaf_weight;
        self
    }

    /// Set the routing policy for sequences too short for a branch pattern.
    #[must_use]
    pub fn with_missing_policy(mut self, missing_policy: MissingPolicy) -> Self {
        self.missing_policy = missing_policy;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of candidate patterns per split.
    #[must_use]
    pub fn n_patterns(&self) -> usize {
        self.n_patterns
    }

    /// Return the element comparison kind.
    #[must_use]
    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    /// Return the candidate ranking statistic.
    #[must_use]
    pub fn ranking(&self) -> PatternRanking {
        self.ranking
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the minimum pattern length.
    #[must_use]
    pub fn min_pattern_len(&self) -> usize {
        self.min_pattern_len
    }

    /// Return the maximum pattern length, if bounded.
    #[must_use]
    pub fn max_pattern_len(&self) -> Option<usize> {
        self.max_pattern_len
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum leaf weight.
    #[must_use]
    pub fn min_leaf_weight(&self) -> f64 {
        self.min_leaf_weight
    }

    /// Return the missing-value routing policy.
    #[must_use]
    pub fn missing_policy(&self) -> MissingPolicy {
        self.missing_policy
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a pattern tree on a set of labeled sequences.
    ///
    /// `sequences[sample_idx]` — one sequence per sample; lengths may vary.
    /// `labels[sample_idx]` — class labels (zero-based).
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ModelError::EmptyDataset`] | `sequences` is empty |
    /// | [`ModelError::SizeMismatch`] | `labels.len() != sequences.len()` |
    /// | [`ModelError::EmptySequence`] | a sequence has zero elements |
    /// | [`ModelError::NonFiniteValue`] | a sequence element is NaN or infinite |
    /// | [`ModelError::InvalidPatternCount`] | `n_patterns` is 0 |
    /// | [`ModelError::InvalidPatternLength`] | length bounds are inconsistent |
    /// | [`ModelError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`ModelError::InvalidMinLeafWeight`] | `min_leaf_weight` is not `> 0` |
    #[instrument(skip(self, sequences, labels), fields(n_samples = sequences.len()))]
    pub fn fit(&self, sequences: &[Vec<f64>], labels: &[usize]) -> Result<PatternTree, ModelError> {
        if labels.len() != sequences.len() {
            return Err(ModelError::SizeMismatch {
                inputs: sequences.len(),
                labels: labels.len(),
            });
        }
        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
        let set = ClassSet::from_labels(labels, n_classes)?;
        self.fit_weighted(sequences, &set)
    }

    /// Train a pattern tree on a pre-built, possibly reweighted class set.
    ///
    /// Bootstrap-aggregated ensembles use this entry point; the sequence
    /// table is shared across members without copying.
    ///
    /// # Errors
    ///
    /// Same conditions as [`PatternTreeConfig::fit`], minus the label
    /// checks already enforced by [`ClassSet`] construction.
    pub fn fit_weighted(
        &self,
        sequences: &[Vec<f64>],
        set: &ClassSet,
    ) -> Result<PatternTree, ModelError> {
        validate_sequences(sequences)?;
        self.validate()?;

        debug!(
            n_samples = sequences.len(),
            n_classes = set.n_classes(),
            total_weight = set.total_weight(),
            "fitting pattern tree"
        );

        let params = PatternSplitParams {
            n_patterns: self.n_patterns,
            kind: self.kind,
            ranking: self.ranking,
            criterion: self.criterion,
            min_pattern_len: self.min_pattern_len,
            max_pattern_len: self.max_pattern_len,
            min_leaf_weight: self.min_leaf_weight,
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<PatternNode> = Vec::new();
        let root = build_node(sequences, set, self, &params, 0, &mut rng, &mut arena);

        debug!(root_index = root.index(), n_nodes = arena.len(), "pattern tree built");

        Ok(PatternTree {
            nodes: arena,
            n_classes: set.n_classes(),
            missing_policy: self.missing_policy,
        })
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.n_patterns == 0 {
            return Err(ModelError::InvalidPatternCount { n_patterns: 0 });
        }
        if self.min_pattern_len == 0
            || self
                .max_pattern_len
                .is_some_and(|max| max < self.min_pattern_len)
        {
            return Err(ModelError::InvalidPatternLength {
                min_len: self.min_pattern_len,
                max_len: self.max_pattern_len.unwrap_or(self.min_pattern_len),
            });
        }
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(ModelError::InvalidMaxDepth { max_depth: 0 });
        }
        if !(self.min_leaf_weight > 0.0) {
            return Err(ModelError::InvalidMinLeafWeight {
                min_leaf_weight: self.min_leaf_weight,
            });
        }
        Ok(())
    }
}

impl Default for PatternTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a sequence table.
///
/// Sequence lengths may vary; missingness is a property of length, so NaN
/// elements are rejected along with infinities.
///
/// # Errors
///
/// Returns [`ModelError::EmptyDataset`], [`ModelError::EmptySequence`], or
/// [`ModelError::NonFiniteValue`].
pub fn validate_sequences(sequences: &[Vec<f64>]) -> Result<(), ModelError> {
    if sequences.is_empty() {
        return Err(ModelError::EmptyDataset);
    }
    for (sample_index, sequence) in sequences.iter().enumerate() {
        if sequence.is_empty() {
            return Err(ModelError::EmptySequence { sample_index });
        }
        for (position, &val) in sequence.iter().enumerate() {
            if !val.is_finite() {
                return Err(ModelError::NonFiniteValue {
                    sample_index,
                    position,
                });
            }
        }
    }
    Ok(())
}

fn build_node(
    sequences: &[Vec<f64>],
    set: &ClassSet,
    config: &PatternTreeConfig,
    params: &PatternSplitParams,
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<PatternNode>,
) -> NodeIndex {
    let distribution = set.distribution();
    let weight = set.total_weight();

    let make_leaf = |arena: &mut Vec<PatternNode>| -> NodeIndex {
        let idx = arena.len();
        arena.push(PatternNode::Leaf {
            distribution: distribution.clone(),
            weight,
        });
        NodeIndex::new(idx)
    };

    let depth_exceeded = config.max_depth.is_some_and(|max_d| depth >= max_d);
    if weight <= config.min_leaf_weight || set.single_class().is_some() || depth_exceeded {
        return make_leaf(arena);
    }

    let split = match find_pattern_split(sequences, set, params, rng) {
        Some(s) => s,
        None => return make_leaf(arena),
    };

    if split.children.left.n_examples() == 0 || split.children.right.n_examples() == 0 {
        return make_leaf(arena);
    }

    // Arena pattern: reserve the index, recurse, then overwrite.
    let node_idx = arena.len();
    arena.push(PatternNode::Leaf {
        distribution: distribution.clone(),
        weight,
    });

    let left = build_node(
        sequences,
        &split.children.left,
        config,
        params,
        depth + 1,
        rng,
        arena,
    );
    let right = build_node(
        sequences,
        &split.children.right,
        config,
        params,
        depth + 1,
        rng,
        arena,
    );
    let missing = split.children.missing.as_ref().map(|missing_set| {
        build_node(sequences, missing_set, config, params, depth + 1, rng, arena)
    });

    arena[node_idx] = PatternNode::Branch {
        pattern: split.pattern,
        cutoff: split.cutoff,
        left,
        right,
        missing,
        class_distances: split.class_distances,
        distribution,
        weight,
    };

    NodeIndex::new(node_idx)
}

/// A node in a pattern-tree arena.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum PatternNode {
    /// An interior branch: route left when the sequence's minimum window
    /// distance to the pattern is at most `cutoff`.
    Branch {
        /// The sampled pattern this branch tests against.
        pattern: Pattern,
        /// Distance cutoff: distances <= cutoff go left.
        cutoff: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Child for sequences shorter than the pattern, when the training
        /// data produced one.
        missing: Option<NodeIndex>,
        /// Mean finite training distance per class at this branch.
        class_distances: Vec<f64>,
        /// Normalized class distribution at this branch.
        distribution: Vec<f64>,
        /// Training weight that reached this branch.
        weight: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Normalized class probability distribution.
        distribution: Vec<f64>,
        /// Training weight in this leaf.
        weight: f64,
    },
}

impl PatternNode {
    /// Return the class distribution at this node.
    #[must_use]
    pub fn distribution(&self) -> &[f64] {
        match self {
            PatternNode::Branch { distribution, .. } | PatternNode::Leaf { distribution, .. } => {
                distribution
            }
        }
    }

    /// Return the training weight that reached this node.
    #[must_use]
    pub fn weight(&self) -> f64 {
        match self {
            PatternNode::Branch { weight, .. } | PatternNode::Leaf { weight, .. } => *weight,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, PatternNode::Leaf { .. })
    }
}

/// A fitted pattern tree.
///
/// Branches test the minimum sliding-window distance between the input
/// sequence and a stored pattern. Input sequences may have any non-zero
/// length; a sequence shorter than a branch pattern follows the missing
/// route.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PatternTree {
    pub(crate) nodes: Vec<PatternNode>,
    pub(crate) n_classes: usize,
    pub(crate) missing_policy: MissingPolicy,
}

impl PatternTree {
    /// Return the total number of nodes (branches and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));
        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                PatternNode::Leaf { .. } => max_depth = max_depth.max(d),
                PatternNode::Branch {
                    left,
                    right,
                    missing,
                    ..
                } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                    if let Some(m) = missing {
                        queue.push_back((m.index(), d + 1));
                    }
                }
            }
        }
        max_depth
    }

    fn traverse(&self, sequence: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                PatternNode::Leaf { .. } => return idx,
                PatternNode::Branch {
                    pattern,
                    cutoff,
                    left,
                    right,
                    missing,
                    ..
                } => {
                    let distance = min_window_distance(sequence, pattern);
                    idx = if distance.is_nan() {
                        match (self.missing_policy, missing) {
                            (MissingPolicy::MissingBranch, Some(m)) => m.index(),
                            _ => right.index(),
                        }
                    } else if distance <= *cutoff {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

impl Classifier for PatternTree {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn estimate(&self, sample: &[f64]) -> Result<Vec<f64>, ModelError> {
        if sample.is_empty() {
            return Err(ModelError::EmptySequence { sample_index: 0 });
        }
        let leaf = self.traverse(sample);
        Ok(self.nodes[leaf].distribution().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level_dataset() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut sequences = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6 {
            sequences.push(vec![0.0, 0.1, 0.0, 0.1, 0.0, i as f64 * 0.01]);
            labels.push(0);
            sequences.push(vec![4.0, 4.1, 4.0, 4.1, 4.0, 4.0 + i as f64 * 0.01]);
            labels.push(1);
        }
        (sequences, labels)
    }

    #[test]
    fn empty_dataset_error() {
        let err = PatternTreeConfig::new().fit(&[], &[]).unwrap_err();
        assert!(matches!(err, ModelError::EmptyDataset));
    }

    #[test]
    fn size_mismatch_error() {
        let sequences = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let err = PatternTreeConfig::new().fit(&sequences, &[0]).unwrap_err();
        assert!(matches!(err, ModelError::SizeMismatch { inputs: 2, labels: 1 }));
    }

    #[test]
    fn empty_sequence_error() {
        let sequences = vec![vec![1.0, 2.0], vec![]];
        let err = PatternTreeConfig::new()
            .fit(&sequences, &[0, 1])
            .unwrap_err();
        assert!(matches!(err, ModelError::EmptySequence { sample_index: 1 }));
    }

    #[test]
    fn non_finite_sequence_error() {
        let sequences = vec![vec![1.0, f64::NAN]];
        let err = PatternTreeConfig::new().fit(&sequences, &[0]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::NonFiniteValue { sample_index: 0, position: 1 }
        ));
    }

    #[test]
    fn invalid_config_rejected() {
        let sequences = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let labels = vec![0, 1];

        let err = PatternTreeConfig::new()
            .with_n_patterns(0)
            .fit(&sequences, &labels)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidPatternCount { n_patterns: 0 }));

        let err = PatternTreeConfig::new()
            .with_min_pattern_len(5)
            .with_max_pattern_len(Some(3))
            .fit(&sequences, &labels)
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::InvalidPatternLength { min_len: 5, max_len: 3 }
        ));

        let err = PatternTreeConfig::new()
            .with_max_depth(Some(0))
            .fit(&sequences, &labels)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidMaxDepth { .. }));

        let err = PatternTreeConfig::new()
            .with_min_leaf_weight(-1.0)
            .fit(&sequences, &labels)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidMinLeafWeight { .. }));
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let sequences = vec![vec![1.0, 2.0, 3.0]; 3];
        let labels = vec![0, 0, 0];
        let tree = PatternTreeConfig::new().fit(&sequences, &labels).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[9.0, 9.0]).unwrap(), 0);
    }

    #[test]
    fn amplitude_separated_classes_memorized() {
        let (sequences, labels) = two_level_dataset();
        let tree = PatternTreeConfig::new()
            .with_n_patterns(30)
            .with_seed(42)
            .fit(&sequences, &labels)
            .unwrap();

        for (sequence, &label) in sequences.iter().zip(&labels) {
            assert_eq!(tree.predict(sequence).unwrap(), label);
        }
    }

    #[test]
    fn variable_length_sequences_accepted() {
        let mut sequences = Vec::new();
        let mut labels = Vec::new();
        for i in 0..5 {
            sequences.push(vec![0.0; 8 + i]);
            labels.push(0);
            sequences.push(vec![7.0; 6 + i]);
            labels.push(1);
        }
        let tree = PatternTreeConfig::new()
            .with_n_patterns(30)
            .with_max_pattern_len(Some(4))
            .with_seed(7)
            .fit(&sequences, &labels)
            .unwrap();

        assert_eq!(tree.predict(&[0.0, 0.0, 0.0, 0.0, 0.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[7.0, 7.0, 7.0, 7.0, 7.0]).unwrap(), 1);
    }

    #[test]
    fn estimate_sums_to_one() {
        let (sequences, labels) = two_level_dataset();
        let tree = PatternTreeConfig::new()
            .with_n_patterns(20)
            .fit(&sequences, &labels)
            .unwrap();
        let proba = tree.estimate(&[2.0, 2.0, 2.0, 2.0]).unwrap();
        let sum: f64 = proba.iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);
        assert_eq!(proba.len(), 2);
    }

    #[test]
    fn empty_prediction_input_rejected() {
        let (sequences, labels) = two_level_dataset();
        let tree = PatternTreeConfig::new().fit(&sequences, &labels).unwrap();
        let err = tree.estimate(&[]).unwrap_err();
        assert!(matches!(err, ModelError::EmptySequence { .. }));
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (sequences, labels) = two_level_dataset();
        let fit = |seed| {
            PatternTreeConfig::new()
                .with_n_patterns(15)
                .with_seed(seed)
                .fit(&sequences, &labels)
                .unwrap()
        };
        let tree1 = fit(99);
        let tree2 = fit(99);
        for sequence in &sequences {
            assert_eq!(
                tree1.predict(sequence).unwrap(),
                tree2.predict(sequence).unwrap()
            );
        }
    }

    #[test]
    fn max_depth_limits_tree() {
        let (sequences, labels) = two_level_dataset();
        let tree = PatternTreeConfig::new()
            .with_n_patterns(20)
            .with_max_depth(Some(1))
            .fit(&sequences, &labels)
            .unwrap();
        assert!(tree.depth() <= 1);
    }

    #[test]
    fn short_prediction_input_follows_missing_policy() {
        let (sequences, labels) = two_level_dataset();
        let tree = PatternTreeConfig::new()
            .with_n_patterns(30)
            .with_min_pattern_len(3)
            .with_max_pattern_len(Some(4))
            .with_missing_policy(MissingPolicy::DefaultRight)
            .fit(&sequences, &labels)
            .unwrap();
        // Shorter than any branch pattern: must still resolve via the
        // default-right route instead of failing.
        assert!(tree.estimate(&[1.0]).is_ok());
    }
}
