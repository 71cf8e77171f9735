//! Bootstrap-aggregated ensembles over decision and pattern trees.
//!
//! Members train in parallel on weighted bootstrap views of a shared input
//! table. The fit records an [`OobMatrix`] of which samples each member
//! never drew, which drives the out-of-bag error, strength/correlation,
//! and bias/variance statistics in [`mod@stats`] — and downstream, conformal
//! calibration without a held-out set.

mod bagging;
mod oob;
pub mod stats;

pub use bagging::{BaggingConfig, BaggingEnsemble, BaggingResult, BaseModel, TrainingMetadata};
pub use oob::OobMatrix;
pub use stats::{BiasVariance, EnsembleQuality, bias_variance, oob_error, oob_estimates, strength_correlation};
