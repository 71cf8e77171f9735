//! Weighted class sets, randomized threshold search, and decision trees.
//!
//! Provides the substrate the rest of the workspace builds on: the
//! [`ClassSet`] weighted example index, the entropy/Gini threshold scan
//! shared by both tree flavors, a CART-style decision tree with missing
//! value routing, and the [`Classifier`] capability trait implemented by
//! every probability-estimating model.

mod class_set;
mod classifier;
mod criterion;
mod error;
mod node;
mod split;
mod tree;

pub use class_set::{ClassSet, Example, Sample, Side, SplitSets};
pub use classifier::{Classifier, argmax};
pub use criterion::{CutPoint, ScanPoint, SplitCriterion, class_set_impurity, find_cut};
pub use error::ModelError;
pub use node::{FeatureIndex, Node, NodeIndex};
pub use tree::{DecisionTree, DecisionTreeConfig, MissingPolicy, validate_feature_table};
