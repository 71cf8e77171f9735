//! Nonconformity scores derived from probability estimates.

/// How a probability estimate turns into a nonconformity score.
///
/// Higher scores mean the label conforms less with the estimate. A
/// candidate label outside the estimate's domain is treated as having
/// probability zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CostFunction {
    /// `0.5 - (p[y] - max p[c != y]) / 2`: maps the margin between the
    /// candidate and the strongest other class into `[0, 1]`.
    Margin,
    /// `1 - p[y]`: the probability mass assigned elsewhere.
    InverseProbability,
}

impl CostFunction {
    /// Score a candidate `label` against a probability estimate.
    #[must_use]
    pub fn score(self, proba: &[f64], label: usize) -> f64 {
        let p_label = proba.get(label).copied().unwrap_or(0.0);
        match self {
            CostFunction::Margin => {
                let strongest_other = proba
                    .iter()
                    .enumerate()
                    .filter(|&(c, _)| c != label)
                    .map(|(_, &p)| p)
                    .fold(0.0, f64::max);
                0.5 - (p_label - strongest_other) / 2.0
            }
            CostFunction::InverseProbability => 1.0 - p_label,
        }
    }
}
