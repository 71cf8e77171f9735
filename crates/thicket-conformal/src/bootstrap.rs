//! Conformal calibration from out-of-bag estimates.
//!
//! Bootstrap-aggregated ensembles can self-calibrate: every training
//! sample has members that never drew it, and their averaged estimate
//! plays the role of a held-out calibration prediction. No data has to be
//! split away from training.

use tracing::{info, instrument};

use thicket_ensemble::{BaggingConfig, oob_estimates};
use thicket_tree::ModelError;

use crate::classifier::{Conditioning, ConformalClassifier, Smoothing};
use crate::error::ConformalError;
use crate::score::CostFunction;

/// Configuration for a self-calibrating conformal ensemble.
///
/// Wraps a [`BaggingConfig`] and the conformal knobs; fitting trains the
/// ensemble and calibrates it from its own out-of-bag estimates in one
/// step.
#[derive(Debug, Clone)]
pub struct BootstrapConformalConfig {
    bagging: BaggingConfig,
    cost: CostFunction,
    conditioning: Conditioning,
    smoothing: Smoothing,
    seed: u64,
}

impl BootstrapConformalConfig {
    /// Create a new config around an ensemble configuration.
    ///
    /// Conformal defaults match [`ConformalClassifier::new`].
    #[must_use]
    pub fn new(bagging: BaggingConfig) -> Self {
        Self {
            bagging,
            cost: CostFunction::Margin,
            conditioning: Conditioning::Unconditional,
            smoothing: Smoothing::Stochastic,
            seed: 42,
        }
    }

    /// Set the nonconformity cost function.
    #[must_use]
    pub fn with_cost(mut self, cost: CostFunction) -> Self {
        self.cost = cost;
        self
    }

    /// Set the calibration conditioning mode.
    #[must_use]
    pub fn with_conditioning(mut self, conditioning: Conditioning) -> Self {
        self.conditioning = conditioning;
        self
    }

    /// Set the tie-smoothing mode.
    #[must_use]
    pub fn with_smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Set the random seed used for stochastic smoothing.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the wrapped ensemble configuration.
    #[must_use]
    pub fn bagging(&self) -> &BaggingConfig {
        &self.bagging
    }

    /// Train the ensemble and calibrate it from out-of-bag estimates.
    ///
    /// Each covered training sample contributes one calibration score: the
    /// nonconformity of its true label under the averaged estimate of the
    /// members that never drew it.
    ///
    /// # Errors
    ///
    /// Any error from [`BaggingConfig::fit`], plus
    /// [`ModelError::NoOobSamples`] when no training sample was left out
    /// by any member.
    #[instrument(skip_all, fields(n_samples = inputs.len()))]
    pub fn fit(
        &self,
        inputs: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<ConformalClassifier, ConformalError> {
        let result = self.bagging.fit(inputs, labels)?;
        let estimates = oob_estimates(result.ensemble(), result.oob(), inputs)?;

        let mut scored = Vec::with_capacity(inputs.len());
        for (estimate, &label) in estimates.iter().zip(labels) {
            if let Some(proba) = estimate {
                scored.push((label, self.cost.score(proba, label)));
            }
        }
        if scored.is_empty() {
            return Err(ConformalError::Model(ModelError::NoOobSamples));
        }

        info!(
            n_calibration_scores = scored.len(),
            n_members = result.ensemble().n_members(),
            "ensemble calibrated from out-of-bag estimates"
        );

        let mut conformal = ConformalClassifier::new(Box::new(result.into_ensemble()))
            .with_cost(self.cost)
            .with_conditioning(self.conditioning)
            .with_smoothing(self.smoothing)
            .with_seed(self.seed);
        conformal.store_scores(scored);
        Ok(conformal)
    }
}

#[cfg(test)]
mod tests {
    use thicket_ensemble::BaseModel;
    use thicket_tree::DecisionTreeConfig;

    use super::*;

    fn two_cluster_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut inputs = Vec::new();
        let mut labels = Vec::new();
        for i in 0..25 {
            inputs.push(vec![i as f64 * 0.1]);
            labels.push(0);
            inputs.push(vec![10.0 + i as f64 * 0.1]);
            labels.push(1);
        }
        (inputs, labels)
    }

    fn config(n_members: usize) -> BootstrapConformalConfig {
        let bagging = BaggingConfig::new(BaseModel::Decision(DecisionTreeConfig::new()))
            .with_n_members(n_members)
            .with_seed(42);
        BootstrapConformalConfig::new(bagging)
    }

    #[test]
    fn fit_yields_calibrated_classifier() {
        let (inputs, labels) = two_cluster_data();
        let conformal = config(30).fit(&inputs, &labels).unwrap();
        assert!(conformal.is_calibrated());
        assert_eq!(conformal.n_classes(), 2);
    }

    #[test]
    fn obvious_samples_predicted() {
        let (inputs, labels) = two_cluster_data();
        let conformal = config(30)
            .with_smoothing(Smoothing::Fixed)
            .fit(&inputs, &labels)
            .unwrap();

        assert_eq!(conformal.predict(&[0.5], 0.2).unwrap(), Some(0));
        assert_eq!(conformal.predict(&[11.0], 0.2).unwrap(), Some(1));
    }

    #[test]
    fn bagging_errors_propagate() {
        let (inputs, _) = two_cluster_data();
        let err = config(30).fit(&inputs, &[0]).unwrap_err();
        assert!(matches!(
            err,
            ConformalError::Model(ModelError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn class_conditional_fit_works() {
        let (inputs, labels) = two_cluster_data();
        let conformal = config(30)
            .with_conditioning(Conditioning::ClassConditional)
            .with_smoothing(Smoothing::Fixed)
            .fit(&inputs, &labels)
            .unwrap();
        let p_values = conformal.estimate(&[0.5]).unwrap();
        assert!(p_values[0] > p_values[1]);
    }
}
