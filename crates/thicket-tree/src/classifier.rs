//! The capability interface shared by all probability-estimating models.

use crate::error::ModelError;

/// A fitted classifier that estimates per-class probabilities.
///
/// Implemented by decision trees, pattern trees, and bagged ensembles;
/// consumed boxed (`Box<dyn Classifier>`) by the ensemble and conformal
/// layers. Implementations are immutable after fitting, so shared read-only
/// use across threads is safe.
pub trait Classifier: Send + Sync {
    /// Return the size of the class label domain.
    fn n_classes(&self) -> usize;

    /// Return the ordered label domain (labels are dense, zero-based).
    fn classes(&self) -> std::ops::Range<usize> {
        0..self.n_classes()
    }

    /// Return the class probability distribution for a single sample.
    ///
    /// The returned `Vec` has length [`n_classes`](Classifier::n_classes)
    /// and sums to 1.0.
    ///
    /// # Errors
    ///
    /// Returns a schema error when the sample is incompatible with the
    /// fitted model (wrong feature count, empty sequence).
    fn estimate(&self, sample: &[f64]) -> Result<Vec<f64>, ModelError>;

    /// Predict the class label for a single sample.
    ///
    /// Defaults to the argmax of [`estimate`](Classifier::estimate).
    ///
    /// # Errors
    ///
    /// Same conditions as [`estimate`](Classifier::estimate).
    fn predict(&self, sample: &[f64]) -> Result<usize, ModelError> {
        Ok(argmax(&self.estimate(sample)?))
    }
}

/// Return the index of the largest probability.
///
/// Ties resolve to the lowest index; an empty slice yields 0.
#[must_use]
pub fn argmax(probs: &[f64]) -> usize {
    probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_picks_largest() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }

    #[test]
    fn argmax_ties_resolve_low() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
    }

    #[test]
    fn argmax_empty_is_zero() {
        assert_eq!(argmax(&[]), 0);
    }
}
