use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::class_set::ClassSet;
use crate::classifier::Classifier;
use crate::criterion::SplitCriterion;
use crate::error::ModelError;
use crate::node::{Node, NodeIndex};
use crate::split::find_numeric_split;

/// How a branch routes an example whose split scalar is undefined.
///
/// The two behaviors both exist in the wild; which one a fitted tree uses
/// is a configuration choice, not a hard-coded default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MissingPolicy {
    /// Follow the dedicated missing child when the branch has one; fall
    /// back to the right child otherwise.
    MissingBranch,
    /// Always follow the right child.
    DefaultRight,
}

/// Configuration for a single decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter         | Default                  |
/// |-------------------|--------------------------|
/// | `criterion`       | `Entropy`                |
/// | `n_candidates`    | `None` (all features)    |
/// | `max_depth`       | `None` (unlimited)       |
/// | `min_leaf_weight` | 1.0                      |
/// | `missing_policy`  | `MissingBranch`          |
/// | `seed`            | 42                       |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) n_candidates: Option<usize>,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_leaf_weight: f64,
    pub(crate) missing_policy: MissingPolicy,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Entropy,
            n_candidates: None,
            max_depth: None,
            min_leaf_weight: 1.0,
            missing_policy: MissingPolicy::MissingBranch,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the number of candidate features examined per split.
    ///
    /// `None` means examine all features.
    #[must_use]
    pub fn with_n_candidates(mut self, n_candidates: Option<usize>) -> Self {
        self.n_candidates = n_candidates;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum weight below which a node becomes a leaf.
    ///
    /// The same bound applies to each child of a candidate split.
    #[must_use]
    pub fn with_min_leaf_weight(mut self, min_leaf_weight: f64) -> Self {
        self.min_leaf_weight = min_leaf_weight;
        self
    }

    /// Set the routing policy for missing values at prediction time.
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

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the candidate feature count per split, if bounded.
    #[must_use]
    pub fn n_candidates(&self) -> Option<usize> {
        self.n_candidates
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

    /// Train a decision tree on the provided row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]` — row-major layout. NaN feature
    /// values are treated as missing; infinities are rejected.
    /// `labels[sample_idx]` — class labels (zero-based).
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ModelError::EmptyDataset`] | `features` is empty |
    /// | [`ModelError::ZeroFeatures`] | rows have zero feature columns |
    /// | [`ModelError::SizeMismatch`] | `labels.len() != features.len()` |
    /// | [`ModelError::FeatureCountMismatch`] | rows have inconsistent lengths |
    /// | [`ModelError::NonFiniteValue`] | any value is infinite |
    /// | [`ModelError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`ModelError::InvalidMinLeafWeight`] | `min_leaf_weight` is not `> 0` |
    /// | [`ModelError::InvalidCandidateCount`] | `n_candidates` resolves outside `[1, n_features]` |
    #[instrument(skip(self, features, labels), fields(n_samples = features.len()))]
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, ModelError> {
        if labels.len() != features.len() {
            return Err(ModelError::SizeMismatch {
                inputs: features.len(),
                labels: labels.len(),
            });
        }
        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
        let set = ClassSet::from_labels(labels, n_classes)?;
        self.fit_weighted(features, &set)
    }

    /// Train a decision tree on a pre-built, possibly reweighted class set.
    ///
    /// Bootstrap-aggregated ensembles use this entry point: the class set
    /// carries per-example draw weights, and the feature table is shared
    /// across all members without copying.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DecisionTreeConfig::fit`], minus the label
    /// checks already enforced by [`ClassSet`] construction.
    pub fn fit_weighted(
        &self,
        features: &[Vec<f64>],
        set: &ClassSet,
    ) -> Result<DecisionTree, ModelError> {
        let n_features = validate_feature_table(features)?;
        self.validate(n_features)?;
        let n_candidates = self.n_candidates.unwrap_or(n_features);

        debug!(
            n_samples = features.len(),
            n_features,
            n_classes = set.n_classes(),
            total_weight = set.total_weight(),
            "fitting decision tree"
        );

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<Node> = Vec::new();
        let root = build_node(features, set, self, n_candidates, 0, &mut rng, &mut arena);

        debug!(root_index = root.index(), n_nodes = arena.len(), "decision tree built");

        Ok(DecisionTree {
            nodes: arena,
            n_features,
            n_classes: set.n_classes(),
            missing_policy: self.missing_policy,
        })
    }

    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
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
        let n_candidates = self.n_candidates.unwrap_or(n_features);
        if n_candidates == 0 || n_candidates > n_features {
            return Err(ModelError::InvalidCandidateCount {
                n_candidates,
                n_features,
            });
        }
        Ok(())
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a row-major feature table and return its column count.
///
/// NaN values pass (they mark missing entries); infinities are rejected.
///
/// # Errors
///
/// Returns [`ModelError::EmptyDataset`], [`ModelError::ZeroFeatures`],
/// [`ModelError::FeatureCountMismatch`], or [`ModelError::NonFiniteValue`].
pub fn validate_feature_table(features: &[Vec<f64>]) -> Result<usize, ModelError> {
    if features.is_empty() {
        return Err(ModelError::EmptyDataset);
    }
    let n_features = features[0].len();
    if n_features == 0 {
        return Err(ModelError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        for (position, &val) in row.iter().enumerate() {
            if val.is_infinite() {
                return Err(ModelError::NonFiniteValue {
                    sample_index,
                    position,
                });
            }
        }
    }
    Ok(n_features)
}

/// Recursively build the arena-based decision tree.
///
/// Returns the [`NodeIndex`] of the node just created in `arena`.
fn build_node(
    features: &[Vec<f64>],
    set: &ClassSet,
    config: &DecisionTreeConfig,
    n_candidates: usize,
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
) -> NodeIndex {
    let distribution = set.distribution();
    let weight = set.total_weight();

    let make_leaf = |arena: &mut Vec<Node>| -> NodeIndex {
        let idx = arena.len();
        arena.push(Node::Leaf {
            distribution: distribution.clone(),
            weight,
        });
        NodeIndex::new(idx)
    };

    let depth_exceeded = config.max_depth.is_some_and(|max_d| depth >= max_d);
    if weight <= config.min_leaf_weight || set.single_class().is_some() || depth_exceeded {
        return make_leaf(arena);
    }

    let split = match find_numeric_split(
        features,
        set,
        n_candidates,
        config.criterion,
        config.min_leaf_weight,
        rng,
    ) {
        Some(s) => s,
        None => return make_leaf(arena),
    };

    // The scan guarantees both sides carry weight, but an empty child still
    // degrades to a leaf over the parent rather than an invalid branch.
    if split.children.left.n_examples() == 0 || split.children.right.n_examples() == 0 {
        return make_leaf(arena);
    }

    // Arena pattern: reserve the index, recurse, then overwrite.
    let node_idx = arena.len();
    arena.push(Node::Leaf {
        distribution: distribution.clone(),
        weight,
    });

    let left = build_node(
        features,
        &split.children.left,
        config,
        n_candidates,
        depth + 1,
        rng,
        arena,
    );
    let right = build_node(
        features,
        &split.children.right,
        config,
        n_candidates,
        depth + 1,
        rng,
        arena,
    );
    let missing = split.children.missing.as_ref().map(|missing_set| {
        build_node(
            features,
            missing_set,
            config,
            n_candidates,
            depth + 1,
            rng,
            arena,
        )
    });

    arena[node_idx] = Node::Branch {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
        missing,
        distribution,
        weight,
    };

    NodeIndex::new(node_idx)
}

/// A fitted decision tree.
///
/// Stored as an arena-based `Vec<Node>` with index references for
/// cache-friendly traversal.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) missing_policy: MissingPolicy,
}

impl DecisionTree {
    /// Return the number of features this tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

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
    ///
    /// A single-node tree (just a root leaf) has depth 0.
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
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Branch {
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

    /// Walk the arena from the root and return the reached leaf's index.
    fn traverse(&self, sample: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Branch {
                    feature,
                    threshold,
                    left,
                    right,
                    missing,
                    ..
                } => {
                    let value = sample[feature.index()];
                    idx = if value.is_nan() {
                        match (self.missing_policy, missing) {
                            (MissingPolicy::MissingBranch, Some(m)) => m.index(),
                            _ => right.index(),
                        }
                    } else if value <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

impl Classifier for DecisionTree {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn estimate(&self, sample: &[f64]) -> Result<Vec<f64>, ModelError> {
        if sample.len() != self.n_features {
            return Err(ModelError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let leaf = self.traverse(sample);
        Ok(self.nodes[leaf].distribution().to_vec())
    }
}
