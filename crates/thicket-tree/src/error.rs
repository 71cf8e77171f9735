/// Errors from classifier training and prediction.
///
/// Shared across the tree, pattern, and ensemble crates so that boxed
/// [`Classifier`](crate::Classifier) values expose a single error type.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when inputs and labels differ in length.
    #[error("got {inputs} inputs but {labels} labels")]
    SizeMismatch {
        /// Number of input rows supplied.
        inputs: usize,
        /// Number of labels supplied.
        labels: usize,
    },

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a prediction input is incompatible with the fitted model.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when a training value is infinite.
    ///
    /// NaN is the missing-value marker and is accepted by numeric feature
    /// columns; only infinities are rejected.
    #[error("non-finite value at sample {sample_index}, position {position}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based position within the sample.
        position: usize,
    },

    /// Returned when a sequence sample has zero time steps.
    #[error("sequence {sample_index} has zero time steps")]
    EmptySequence {
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when fewer than two distinct classes are present.
    #[error("need at least 2 distinct classes, got {n_classes}")]
    InsufficientClasses {
        /// The number of distinct classes found in the labels.
        n_classes: usize,
    },

    /// Returned when a label exceeds the declared class domain.
    #[error("label {label} at sample {sample_index} exceeds class domain of size {n_classes}")]
    LabelOutOfRange {
        /// The offending label value.
        label: usize,
        /// The declared number of classes.
        n_classes: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when min_leaf_weight is not strictly positive.
    #[error("min_leaf_weight must be > 0, got {min_leaf_weight}")]
    InvalidMinLeafWeight {
        /// The invalid min_leaf_weight value provided.
        min_leaf_weight: f64,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when n_candidates resolves to 0 or exceeds n_features.
    #[error("n_candidates resolved to {n_candidates}, but must be in [1, {n_features}]")]
    InvalidCandidateCount {
        /// The resolved candidate count.
        n_candidates: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when the pattern length bounds are inconsistent.
    #[error("pattern length bounds [{min_len}, {max_len}] are invalid")]
    InvalidPatternLength {
        /// The configured minimum pattern length.
        min_len: usize,
        /// The configured (or resolved) maximum pattern length.
        max_len: usize,
    },

    /// Returned when n_patterns is zero.
    #[error("n_patterns must be at least 1, got {n_patterns}")]
    InvalidPatternCount {
        /// The invalid n_patterns value provided.
        n_patterns: usize,
    },

    /// Returned when n_members is zero.
    #[error("n_members must be at least 1, got {n_members}")]
    InvalidMemberCount {
        /// The invalid n_members value provided.
        n_members: usize,
    },

    /// Returned when a parallel ensemble-member build fails.
    ///
    /// A single member failure always fails the entire ensemble fit; a
    /// partial ensemble is never returned.
    #[error("ensemble member {member} failed to build")]
    BuildTaskFailure {
        /// The zero-based index of the member whose build failed.
        member: usize,
        /// The underlying build error.
        #[source]
        source: Box<ModelError>,
    },

    /// Returned when a dedicated thread pool could not be constructed.
    #[error("failed to build thread pool: {reason}")]
    ThreadPoolBuild {
        /// Human-readable description of the pool construction failure.
        reason: String,
    },

    /// Returned when an out-of-bag computation finds no usable sample.
    #[error("out-of-bag computation failed: no sample has any out-of-bag member")]
    NoOobSamples,
}
