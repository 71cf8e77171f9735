//! Conformal calibration and p-value prediction.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, instrument};

use thicket_tree::{Classifier, ModelError};

use crate::error::ConformalError;
use crate::score::CostFunction;

/// Which calibration scores a candidate label is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Conditioning {
    /// One pooled score list shared by every candidate label.
    Unconditional,
    /// A separate score list per class; each candidate label is compared
    /// only against calibration samples of that class.
    ClassConditional,
}

/// How ties between the candidate score and calibration scores count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Smoothing {
    /// Ties count fully: the classic conservative p-value.
    Fixed,
    /// Ties count by a uniform random fraction, making the p-value exactly
    /// uniform under exchangeability.
    Stochastic,
}

/// Calibration scores, laid out per the conditioning mode.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum CalibrationStore {
    Pooled(Vec<f64>),
    PerClass(Vec<Vec<f64>>),
}

/// A conformal wrapper around a probability-estimating model.
///
/// After [`calibrate`](ConformalClassifier::calibrate), the wrapper turns
/// the model's estimates into per-label p-values: the fraction of
/// calibration samples that conform no better than the candidate label.
/// A label's p-value is the evidence against rejecting that label.
pub struct ConformalClassifier {
    model: Box<dyn Classifier>,
    cost: CostFunction,
    conditioning: Conditioning,
    smoothing: Smoothing,
    seed: u64,
    calibration: Option<CalibrationStore>,
}

impl fmt::Debug for ConformalClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConformalClassifier")
            .field("n_classes", &self.model.n_classes())
            .field("cost", &self.cost)
            .field("conditioning", &self.conditioning)
            .field("smoothing", &self.smoothing)
            .field("seed", &self.seed)
            .field("calibrated", &self.calibration.is_some())
            .finish()
    }
}

impl ConformalClassifier {
    /// Wrap a fitted model. The wrapper starts uncalibrated.
    ///
    /// # Defaults
    ///
    /// | Parameter      | Default           |
    /// |----------------|-------------------|
    /// | `cost`         | `Margin`          |
    /// | `conditioning` | `Unconditional`   |
    /// | `smoothing`    | `Stochastic`      |
    /// | `seed`         | 42                |
    #[must_use]
    pub fn new(model: Box<dyn Classifier>) -> Self {
        Self {
            model,
            cost: CostFunction::Margin,
            conditioning: Conditioning::Unconditional,
            smoothing: Smoothing::Stochastic,
            seed: 42,
            calibration: None,
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

    // --- Getters ---

    /// Return the wrapped model.
    #[must_use]
    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    /// Return the size of the class label domain.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.model.n_classes()
    }

    /// Return the nonconformity cost function.
    #[must_use]
    pub fn cost(&self) -> CostFunction {
        self.cost
    }

    /// Return the conditioning mode.
    #[must_use]
    pub fn conditioning(&self) -> Conditioning {
        self.conditioning
    }

    /// Return the smoothing mode.
    #[must_use]
    pub fn smoothing(&self) -> Smoothing {
        self.smoothing
    }

    /// Return `true` once calibration scores are in place.
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Calibrate against a labeled set the model was not trained on.
    ///
    /// Replaces any previous calibration.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ConformalError::EmptyCalibrationSet`] | `inputs` is empty |
    /// | [`ConformalError::CalibrationLabelOutOfRange`] | a label exceeds the class domain |
    /// | [`ConformalError::Model`] | sizes mismatch, or a sample is incompatible with the model |
    #[instrument(skip_all, fields(n_samples = inputs.len()))]
    pub fn calibrate(&mut self, inputs: &[Vec<f64>], labels: &[usize]) -> Result<(), ConformalError> {
        if inputs.is_empty() {
            return Err(ConformalError::EmptyCalibrationSet);
        }
        if labels.len() != inputs.len() {
            return Err(ConformalError::Model(ModelError::SizeMismatch {
                inputs: inputs.len(),
                labels: labels.len(),
            }));
        }

        let mut scored = Vec::with_capacity(inputs.len());
        for (sample_index, (sample, &label)) in inputs.iter().zip(labels).enumerate() {
            if label >= self.model.n_classes() {
                return Err(ConformalError::CalibrationLabelOutOfRange {
                    label,
                    n_classes: self.model.n_classes(),
                    sample_index,
                });
            }
            let proba = self.model.estimate(sample)?;
            scored.push((label, self.cost.score(&proba, label)));
        }
        self.store_scores(scored);
        Ok(())
    }

    /// Install pre-computed `(label, score)` calibration pairs.
    ///
    /// Used by the bootstrap path, where scores come from out-of-bag
    /// estimates rather than a held-out set.
    pub(crate) fn store_scores(&mut self, scored: Vec<(usize, f64)>) {
        let store = match self.conditioning {
            Conditioning::Unconditional => {
                CalibrationStore::Pooled(scored.into_iter().map(|(_, s)| s).collect())
            }
            Conditioning::ClassConditional => {
                let mut per_class = vec![Vec::new(); self.model.n_classes()];
                for (label, score) in scored {
                    per_class[label].push(score);
                }
                CalibrationStore::PerClass(per_class)
            }
        };
        debug!(conditioning = ?self.conditioning, "calibration stored");
        self.calibration = Some(store);
    }

    /// Compute the p-value of every candidate label for one sample.
    ///
    /// The stochastic smoothing draw derives from the master seed and the
    /// sample itself, so distinct queries draw distinct ties while the
    /// same query always reproduces its result.
    ///
    /// # Errors
    ///
    /// Returns [`ConformalError::NotCalibrated`] before calibration, plus
    /// any estimation error from the model.
    pub fn estimate(&self, sample: &[f64]) -> Result<Vec<f64>, ConformalError> {
        let mut rng = self.query_rng(sample);
        self.p_values(sample, &mut rng)
    }

    /// Compute p-values for a batch of samples, in parallel.
    ///
    /// Each row equals [`estimate`](ConformalClassifier::estimate) of the
    /// corresponding sample; the result does not depend on evaluation
    /// order.
    ///
    /// # Errors
    ///
    /// Same conditions as [`estimate`](ConformalClassifier::estimate),
    /// for the first offending sample.
    pub fn estimate_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ConformalError> {
        samples.par_iter().map(|sample| self.estimate(sample)).collect()
    }

    /// Per-query RNG: the master seed mixed with the sample's bits.
    fn query_rng(&self, sample: &[f64]) -> ChaCha8Rng {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        for value in sample {
            value.to_bits().hash(&mut hasher);
        }
        ChaCha8Rng::seed_from_u64(hasher.finish())
    }

    /// Predict a single label, or abstain.
    ///
    /// Returns `Some(label)` when exactly one label's p-value exceeds
    /// `significance`; `None` (abstention) when zero or several do.
    ///
    /// # Errors
    ///
    /// Returns [`ConformalError::InvalidSignificance`] outside `[0, 1]`,
    /// plus the conditions of [`estimate`](ConformalClassifier::estimate).
    pub fn predict(&self, sample: &[f64], significance: f64) -> Result<Option<usize>, ConformalError> {
        validate_significance(significance)?;
        let p_values = self.estimate(sample)?;
        let mut accepted = p_values
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p > significance)
            .map(|(label, _)| label);
        match (accepted.next(), accepted.next()) {
            (Some(label), None) => Ok(Some(label)),
            _ => Ok(None),
        }
    }

    /// Compute the prediction set at a significance level.
    ///
    /// Contains every label whose p-value is at least `significance`; the
    /// true label is included with probability at least `1 - significance`
    /// under exchangeability. At significance 0 the set is the full label
    /// domain.
    ///
    /// # Errors
    ///
    /// Same conditions as [`predict`](ConformalClassifier::predict).
    pub fn conformal_predict(
        &self,
        sample: &[f64],
        significance: f64,
    ) -> Result<Vec<usize>, ConformalError> {
        validate_significance(significance)?;
        let p_values = self.estimate(sample)?;
        Ok(p_values
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p >= significance)
            .map(|(label, _)| label)
            .collect())
    }

    fn p_values(&self, sample: &[f64], rng: &mut ChaCha8Rng) -> Result<Vec<f64>, ConformalError> {
        let Some(calibration) = &self.calibration else {
            return Err(ConformalError::NotCalibrated);
        };
        let proba = self.model.estimate(sample)?;
        let tau = match self.smoothing {
            Smoothing::Fixed => 1.0,
            Smoothing::Stochastic => rng.r#gen::<f64>(),
        };

        let p_values = (0..self.model.n_classes())
            .map(|label| {
                let nc = self.cost.score(&proba, label);
                let scores = match calibration {
                    CalibrationStore::Pooled(scores) => scores.as_slice(),
                    CalibrationStore::PerClass(per_class) => per_class[label].as_slice(),
                };
                p_value(scores, nc, tau)
            })
            .collect();
        Ok(p_values)
    }
}

/// Smoothed conformal p-value of a candidate score against a calibration
/// score list.
///
/// Counts the candidate itself among the ties, so the result is always in
/// `(0, 1]` for `tau > 0`.
fn p_value(scores: &[f64], nc: f64, tau: f64) -> f64 {
    let mut greater = 0usize;
    let mut equal = 0usize;
    for &s in scores {
        if s > nc {
            greater += 1;
        } else if s == nc {
            equal += 1;
        }
    }
    (greater as f64 + tau * (equal as f64 + 1.0)) / (scores.len() as f64 + 1.0)
}

fn validate_significance(significance: f64) -> Result<(), ConformalError> {
    if !(0.0..=1.0).contains(&significance) {
        return Err(ConformalError::InvalidSignificance { significance });
    }
    Ok(())
}
