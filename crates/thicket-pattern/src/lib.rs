//! Pattern trees over variable-length sequences.
//!
//! A pattern tree is a decision tree whose branch feature is the minimum
//! sliding-window distance between the input sequence and a sub-sequence
//! pattern sampled from the training data. Numeric sequences compare by
//! Euclidean window distance, categorical ones by 0/1 indicator distance.

mod distance;
mod pattern;
mod split;
mod tree;

pub use distance::min_window_distance;
pub use pattern::{Pattern, SequenceKind};
pub use split::PatternRanking;
pub use tree::{PatternNode, PatternTree, PatternTreeConfig, validate_sequences};
