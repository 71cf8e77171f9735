//! Conformal prediction on top of probability-estimating classifiers.
//!
//! Wraps any fitted [`thicket_tree::Classifier`] with a calibration layer
//! that turns probability estimates into per-label p-values with a finite
//! sample coverage guarantee: at significance `e`, the prediction set
//! misses the true label with probability at most `e` under
//! exchangeability. Calibration comes either from a held-out set or, for
//! bagged ensembles, from their own out-of-bag estimates.

mod bootstrap;
mod classifier;
mod error;
mod score;

pub use bootstrap::BootstrapConformalConfig;
pub use classifier::{Conditioning, ConformalClassifier, Smoothing};
pub use error::ConformalError;
pub use score::CostFunction;
