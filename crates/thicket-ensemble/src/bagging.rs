//! Bootstrap-aggregated ensemble training with parallel member construction.

use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use thicket_pattern::{PatternTreeConfig, validate_sequences};
use thicket_tree::{ClassSet, Classifier, DecisionTreeConfig, ModelError, validate_feature_table};

use crate::oob::OobMatrix;

/// The base model every ensemble member is an instance of.
///
/// The wrapped config supplies everything except the seed, which the
/// trainer overrides per member.
#[derive(Debug, Clone)]
pub enum BaseModel {
    /// Decision trees over fixed-width numeric feature rows.
    Decision(DecisionTreeConfig),
    /// Pattern trees over variable-length sequences.
    Pattern(PatternTreeConfig),
}

impl BaseModel {
    fn validate_inputs(&self, inputs: &[Vec<f64>]) -> Result<(), ModelError> {
        match self {
            BaseModel::Decision(_) => validate_feature_table(inputs).map(|_| ()),
            BaseModel::Pattern(_) => validate_sequences(inputs),
        }
    }

    fn fit_member(
        &self,
        inputs: &[Vec<f64>],
        set: &ClassSet,
        seed: u64,
    ) -> Result<Box<dyn Classifier>, ModelError> {
        match self {
            BaseModel::Decision(config) => Ok(Box::new(
                config.clone().with_seed(seed).fit_weighted(inputs, set)?,
            )),
            BaseModel::Pattern(config) => Ok(Box::new(
                config.clone().with_seed(seed).fit_weighted(inputs, set)?,
            )),
        }
    }
}

/// Configuration for a bootstrap-aggregated ensemble.
///
/// Construct via [`BaggingConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter   | Default                   |
/// |-------------|---------------------------|
/// | `n_members` | 100                       |
/// | `seed`      | 42                        |
/// | `n_threads` | `None` (global pool)      |
#[derive(Debug, Clone)]
pub struct BaggingConfig {
    pub(crate) base: BaseModel,
    pub(crate) n_members: usize,
    pub(crate) seed: u64,
    pub(crate) n_threads: Option<usize>,
}

impl BaggingConfig {
    /// Create a new config around a base model.
    #[must_use]
    pub fn new(base: BaseModel) -> Self {
        Self {
            base,
            n_members: 100,
            seed: 42,
            n_threads: None,
        }
    }

    /// Set the number of ensemble members.
    #[must_use]
    pub fn with_n_members(mut self, n_members: usize) -> Self {
        self.n_members = n_members;
        self
    }

    /// Set the master random seed for reproducibility.
    ///
    /// Per-member seeds derive from this one, so results do not depend on
    /// thread scheduling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set a dedicated thread count for training.
    ///
    /// `None` uses the process-global rayon pool.
    #[must_use]
    pub fn with_n_threads(mut self, n_threads: Option<usize>) -> Self {
        self.n_threads = n_threads;
        self
    }

    // --- Getters ---

    /// Return the base model configuration.
    #[must_use]
    pub fn base(&self) -> &BaseModel {
        &self.base
    }

    /// Return the number of ensemble members.
    #[must_use]
    pub fn n_members(&self) -> usize {
        self.n_members
    }

    /// Return the master random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the dedicated thread count, if any.
    #[must_use]
    pub fn n_threads(&self) -> Option<usize> {
        self.n_threads
    }

    /// Train the ensemble on the provided inputs and labels.
    ///
    /// Each member is fit on a full-size bootstrap of the training set,
    /// expressed as per-example draw weights over the shared input table.
    /// Members train in parallel; any single member failure fails the
    /// whole fit, never yielding a partial ensemble.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ModelError::SizeMismatch`] | `labels.len() != inputs.len()` |
    /// | [`ModelError::InvalidMemberCount`] | `n_members` is 0 |
    /// | [`ModelError::InsufficientClasses`] | fewer than 2 distinct labels |
    /// | [`ModelError::ThreadPoolBuild`] | the dedicated pool could not start |
    /// | [`ModelError::BuildTaskFailure`] | a member build failed |
    ///
    /// Input-schema errors from the base model surface before any member
    /// is built.
    #[instrument(skip_all, fields(n_members = self.n_members, n_samples = inputs.len()))]
    pub fn fit(&self, inputs: &[Vec<f64>], labels: &[usize]) -> Result<BaggingResult, ModelError> {
        if labels.len() != inputs.len() {
            return Err(ModelError::SizeMismatch {
                inputs: inputs.len(),
                labels: labels.len(),
            });
        }
        if self.n_members == 0 {
            return Err(ModelError::InvalidMemberCount { n_members: 0 });
        }
        self.base.validate_inputs(inputs)?;

        let n_samples = inputs.len();
        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
        let mut present = vec![false; n_classes];
        for (sample_index, &label) in labels.iter().enumerate() {
            if label >= n_classes {
                return Err(ModelError::LabelOutOfRange {
                    label,
                    n_classes,
                    sample_index,
                });
            }
            present[label] = true;
        }
        let distinct = present.iter().filter(|&&p| p).count();
        if distinct < 2 {
            return Err(ModelError::InsufficientClasses { n_classes: distinct });
        }

        info!(
            n_members = self.n_members,
            n_samples, n_classes, "training bagging ensemble"
        );

        // Per-member seeds from the master RNG keep the fit deterministic
        // regardless of how rayon schedules the builds.
        let mut master_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let member_seeds: Vec<u64> = (0..self.n_members).map(|_| master_rng.r#gen()).collect();

        let base = &self.base;
        let train = || -> Result<Vec<(Box<dyn Classifier>, Vec<bool>)>, ModelError> {
            member_seeds
                .into_par_iter()
                .enumerate()
                .map(|(member, seed)| {
                    build_member(base, inputs, labels, n_classes, seed).map_err(|source| {
                        ModelError::BuildTaskFailure {
                            member,
                            source: Box::new(source),
                        }
                    })
                })
                .collect()
        };

        let built = match self.n_threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ModelError::ThreadPoolBuild {
                        reason: e.to_string(),
                    })?;
                pool.install(train)?
            }
            None => train()?,
        };

        let mut members = Vec::with_capacity(self.n_members);
        let mut columns = Vec::with_capacity(self.n_members);
        for (member, column) in built {
            members.push(member);
            columns.push(column);
        }
        let oob = OobMatrix::from_columns(&columns, n_samples);

        debug!(
            oob_density = oob.density(),
            covered = oob.n_covered_samples(),
            "ensemble training complete"
        );

        Ok(BaggingResult {
            ensemble: BaggingEnsemble { members, n_classes },
            oob,
            metadata: TrainingMetadata {
                n_members: self.n_members,
                n_samples,
                n_classes,
            },
        })
    }
}

/// Fit one member: draw a bootstrap, reweight the class set, train.
fn build_member(
    base: &BaseModel,
    inputs: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
    seed: u64,
) -> Result<(Box<dyn Classifier>, Vec<bool>), ModelError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n_samples = inputs.len();

    let mut counts = vec![0usize; n_samples];
    for _ in 0..n_samples {
        counts[rng.gen_range(0..n_samples)] += 1;
    }
    let oob_column: Vec<bool> = counts.iter().map(|&c| c == 0).collect();

    let set = ClassSet::from_counts(labels, &counts, n_classes)?;
    let member = base.fit_member(inputs, &set, rng.r#gen())?;
    Ok((member, oob_column))
}

/// A fitted bootstrap-aggregated ensemble.
///
/// The ensemble estimate is the uniform average of the member estimates.
pub struct BaggingEnsemble {
    pub(crate) members: Vec<Box<dyn Classifier>>,
    pub(crate) n_classes: usize,
}

impl fmt::Debug for BaggingEnsemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaggingEnsemble")
            .field("n_members", &self.members.len())
            .field("n_classes", &self.n_classes)
            .finish()
    }
}

impl BaggingEnsemble {
    /// Return the number of members.
    #[must_use]
    pub fn n_members(&self) -> usize {
        self.members.len()
    }

    /// Return the fitted members, in build order.
    #[must_use]
    pub fn members(&self) -> &[Box<dyn Classifier>] {
        &self.members
    }

    /// Estimate class probabilities for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Classifier::estimate`], for the first
    /// offending sample.
    pub fn estimate_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        samples.par_iter().map(|s| self.estimate(s)).collect()
    }

    /// Predict class labels for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Classifier::predict`], for the first
    /// offending sample.
    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<usize>, ModelError> {
        samples.par_iter().map(|s| self.predict(s)).collect()
    }
}

impl Classifier for BaggingEnsemble {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn estimate(&self, sample: &[f64]) -> Result<Vec<f64>, ModelError> {
        let mut acc = vec![0.0; self.n_classes];
        for member in &self.members {
            let proba = member.estimate(sample)?;
            for (a, p) in acc.iter_mut().zip(&proba) {
                *a += p;
            }
        }
        let n = self.members.len() as f64;
        for a in &mut acc {
            *a /= n;
        }
        Ok(acc)
    }
}

/// Summary of a completed ensemble fit.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct TrainingMetadata {
    /// Number of members trained.
    pub n_members: usize,
    /// Number of training samples.
    pub n_samples: usize,
    /// Size of the class label domain.
    pub n_classes: usize,
}

/// The outcome of [`BaggingConfig::fit`]: the ensemble plus its
/// out-of-bag bookkeeping.
#[derive(Debug)]
pub struct BaggingResult {
    ensemble: BaggingEnsemble,
    oob: OobMatrix,
    metadata: TrainingMetadata,
}

impl BaggingResult {
    /// Return the fitted ensemble.
    #[must_use]
    pub fn ensemble(&self) -> &BaggingEnsemble {
        &self.ensemble
    }

    /// Return the out-of-bag matrix.
    #[must_use]
    pub fn oob(&self) -> &OobMatrix {
        &self.oob
    }

    /// Return the training metadata.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    /// Consume the result, keeping only the ensemble.
    #[must_use]
    pub fn into_ensemble(self) -> BaggingEnsemble {
        self.ensemble
    }
}
