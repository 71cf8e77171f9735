//! Ensemble quality statistics computed from out-of-bag estimates.

use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use thicket_tree::{Classifier, ModelError, argmax};

use crate::bagging::BaggingEnsemble;
use crate::oob::OobMatrix;

/// Per-sample out-of-bag probability estimates.
///
/// Each covered sample gets the uniform average over the members for which
/// it was out-of-bag; samples every member drew are `None`.
///
/// # Errors
///
/// Returns [`ModelError::SizeMismatch`] when the matrix does not cover
/// `inputs`, plus any estimation error from the members.
pub fn oob_estimates(
    ensemble: &BaggingEnsemble,
    oob: &OobMatrix,
    inputs: &[Vec<f64>],
) -> Result<Vec<Option<Vec<f64>>>, ModelError> {
    if oob.n_samples() != inputs.len() {
        return Err(ModelError::SizeMismatch {
            inputs: inputs.len(),
            labels: oob.n_samples(),
        });
    }
    let members = ensemble.members();
    inputs
        .par_iter()
        .enumerate()
        .map(|(sample_idx, sample)| {
            let mut acc = vec![0.0; ensemble.n_classes()];
            let mut n = 0usize;
            for member_idx in oob.oob_members(sample_idx) {
                let proba = members[member_idx].estimate(sample)?;
                for (a, p) in acc.iter_mut().zip(&proba) {
                    *a += p;
                }
                n += 1;
            }
            if n == 0 {
                return Ok(None);
            }
            for a in &mut acc {
                *a /= n as f64;
            }
            Ok(Some(acc))
        })
        .collect()
}

/// Out-of-bag misclassification rate.
///
/// Each covered sample is judged only by the members that never drew it,
/// giving an internal generalization estimate without a held-out set.
///
/// # Errors
///
/// | Variant | When |
/// |---|---|
/// | [`ModelError::SizeMismatch`] | `labels` does not cover `inputs` |
/// | [`ModelError::LabelOutOfRange`] | a label exceeds the class domain |
/// | [`ModelError::NoOobSamples`] | no sample has any out-of-bag member |
pub fn oob_error(
    ensemble: &BaggingEnsemble,
    oob: &OobMatrix,
    inputs: &[Vec<f64>],
    labels: &[usize],
) -> Result<f64, ModelError> {
    validate_labels(ensemble, inputs, labels)?;
    let estimates = oob_estimates(ensemble, oob, inputs)?;

    let mut covered = 0usize;
    let mut wrong = 0usize;
    for (estimate, &label) in estimates.iter().zip(labels) {
        if let Some(proba) = estimate {
            covered += 1;
            if argmax(proba) != label {
                wrong += 1;
            }
        }
    }
    if covered == 0 {
        return Err(ModelError::NoOobSamples);
    }
    Ok(wrong as f64 / covered as f64)
}

/// Strength, margin variance, mean member correlation, and the resulting
/// generalization error bound.
///
/// Degenerate denominators yield 0.0 in place of the affected statistic.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct EnsembleQuality {
    /// Mean out-of-bag margin: the expected gap between the probability of
    /// the true class and the strongest wrong class.
    pub strength: f64,
    /// Variance of the out-of-bag margin across samples.
    pub margin_variance: f64,
    /// Mean correlation between member votes.
    pub correlation: f64,
    /// Upper bound on generalization error: `correlation * (1 - s^2) / s^2`.
    pub error_bound: f64,
}

/// Compute ensemble strength and member correlation from out-of-bag votes.
///
/// # Errors
///
/// Same conditions as [`oob_error`].
pub fn strength_correlation(
    ensemble: &BaggingEnsemble,
    oob: &OobMatrix,
    inputs: &[Vec<f64>],
    labels: &[usize],
) -> Result<EnsembleQuality, ModelError> {
    validate_labels(ensemble, inputs, labels)?;
    let estimates = oob_estimates(ensemble, oob, inputs)?;

    // Margin and strongest-wrong-class per covered sample.
    let mut margin_sum = 0.0;
    let mut margin_sq_sum = 0.0;
    let mut covered = 0usize;
    let mut runner_up: Vec<Option<usize>> = vec![None; inputs.len()];

    for (sample_idx, (estimate, &label)) in estimates.iter().zip(labels).enumerate() {
        let Some(proba) = estimate else { continue };
        let (wrong_class, wrong_p) = strongest_wrong_class(proba, label);
        let margin = proba[label] - wrong_p;
        margin_sum += margin;
        margin_sq_sum += margin * margin;
        covered += 1;
        runner_up[sample_idx] = Some(wrong_class);
    }
    if covered == 0 {
        return Err(ModelError::NoOobSamples);
    }

    let strength = margin_sum / covered as f64;
    let margin_variance = margin_sq_sum / covered as f64 - strength * strength;

    // Per-member vote standard deviation over its own out-of-bag samples.
    let member_sds: Vec<Option<f64>> = ensemble
        .members()
        .par_iter()
        .enumerate()
        .map(|(member_idx, member)| -> Result<Option<f64>, ModelError> {
            let mut n = 0usize;
            let mut hits_true = 0usize;
            let mut hits_wrong = 0usize;
            for sample_idx in oob.oob_samples(member_idx) {
                let Some(wrong_class) = runner_up[sample_idx] else {
                    continue;
                };
                let vote = member.predict(&inputs[sample_idx])?;
                if vote == labels[sample_idx] {
                    hits_true += 1;
                } else if vote == wrong_class {
                    hits_wrong += 1;
                }
                n += 1;
            }
            if n == 0 {
                return Ok(None);
            }
            let p1 = hits_true as f64 / n as f64;
            let p2 = hits_wrong as f64 / n as f64;
            Ok(Some((p1 + p2 + (p1 - p2) * (p1 - p2)).sqrt()))
        })
        .collect::<Result<_, _>>()?;

    let mut sd_sum = 0.0;
    let mut sd_count = 0usize;
    for sd in member_sds.into_iter().flatten() {
        sd_sum += sd;
        sd_count += 1;
    }

    let mean_sd = if sd_count == 0 { 0.0 } else { sd_sum / sd_count as f64 };
    let correlation = if mean_sd > 0.0 {
        margin_variance / (mean_sd * mean_sd)
    } else {
        0.0
    };
    let error_bound = if strength > 0.0 {
        correlation * (1.0 - strength * strength) / (strength * strength)
    } else {
        0.0
    };

    Ok(EnsembleQuality {
        strength,
        margin_variance,
        correlation,
        error_bound,
    })
}

/// Exact bias/variance decomposition of the ensemble's squared estimate
/// error.
///
/// For every sample, the target is the one-hot encoding of its label; the
/// decomposition holds exactly: `mse == bias + variance` up to floating
/// point rounding.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct BiasVariance {
    /// Mean squared distance between the averaged estimate and the target.
    pub bias: f64,
    /// Mean squared spread of member estimates around their average.
    pub variance: f64,
    /// Mean squared distance between individual member estimates and the
    /// target. Equals `bias + variance`.
    pub mse: f64,
}

/// Decompose the ensemble's squared error into bias and variance.
///
/// All members judge all samples; no out-of-bag filtering applies here.
///
/// # Errors
///
/// Returns [`ModelError::SizeMismatch`] or [`ModelError::LabelOutOfRange`]
/// on malformed arguments, plus any estimation error from the members.
pub fn bias_variance(
    ensemble: &BaggingEnsemble,
    inputs: &[Vec<f64>],
    labels: &[usize],
) -> Result<BiasVariance, ModelError> {
    validate_labels(ensemble, inputs, labels)?;

    let members = ensemble.members();
    let n_classes = ensemble.n_classes();
    let n_members = members.len() as f64;

    let per_sample: Vec<(f64, f64, f64)> = inputs
        .par_iter()
        .zip(labels)
        .map(|(sample, &label)| -> Result<(f64, f64, f64), ModelError> {
            let member_estimates: Vec<Vec<f64>> = members
                .iter()
                .map(|m| m.estimate(sample))
                .collect::<Result<_, _>>()?;

            let mut bias = 0.0;
            let mut variance = 0.0;
            let mut mse = 0.0;
            for class in 0..n_classes {
                let target = if class == label { 1.0 } else { 0.0 };
                let mean: f64 =
                    member_estimates.iter().map(|p| p[class]).sum::<f64>() / n_members;

                bias += (mean - target) * (mean - target);
                for p in &member_estimates {
                    let d_mean = p[class] - mean;
                    let d_target = p[class] - target;
                    variance += d_mean * d_mean / n_members;
                    mse += d_target * d_target / n_members;
                }
            }
            Ok((bias, variance, mse))
        })
        .collect::<Result<_, _>>()?;

    let mut bias = 0.0;
    let mut variance = 0.0;
    let mut mse = 0.0;
    for (b, v, m) in per_sample {
        bias += b;
        variance += v;
        mse += m;
    }

    let n = inputs.len() as f64;
    Ok(BiasVariance {
        bias: bias / n,
        variance: variance / n,
        mse: mse / n,
    })
}

fn validate_labels(
    ensemble: &BaggingEnsemble,
    inputs: &[Vec<f64>],
    labels: &[usize],
) -> Result<(), ModelError> {
    if labels.len() != inputs.len() {
        return Err(ModelError::SizeMismatch {
            inputs: inputs.len(),
            labels: labels.len(),
        });
    }
    for (sample_index, &label) in labels.iter().enumerate() {
        if label >= ensemble.n_classes() {
            return Err(ModelError::LabelOutOfRange {
                label,
                n_classes: ensemble.n_classes(),
                sample_index,
            });
        }
    }
    Ok(())
}

/// The strongest class other than `label` and its probability.
fn strongest_wrong_class(proba: &[f64], label: usize) -> (usize, f64) {
    let mut best_class = usize::from(label == 0);
    let mut best_p = f64::NEG_INFINITY;
    for (class, &p) in proba.iter().enumerate() {
        if class != label && p > best_p {
            best_class = class;
            best_p = p;
        }
    }
    (best_class, best_p)
}
