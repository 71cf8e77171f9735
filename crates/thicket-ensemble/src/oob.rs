//! Out-of-bag bookkeeping for bootstrap-aggregated ensembles.

/// Which (sample, member) pairs were left out of a member's bootstrap.
///
/// Stored row-major: one flag per sample per member. A flag is `true` when
/// the sample was never drawn into the member's bootstrap, making the
/// member an unbiased judge of that sample.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OobMatrix {
    flags: Vec<bool>,
    n_samples: usize,
    n_members: usize,
}

impl OobMatrix {
    /// Assemble the matrix from per-member columns.
    ///
    /// Every column must cover the same number of samples; the trainer
    /// guarantees this by construction.
    pub(crate) fn from_columns(columns: &[Vec<bool>], n_samples: usize) -> Self {
        let n_members = columns.len();
        let mut flags = vec![false; n_samples * n_members];
        for (member, column) in columns.iter().enumerate() {
            for (sample, &oob) in column.iter().enumerate() {
                flags[sample * n_members + member] = oob;
            }
        }
        Self {
            flags,
            n_samples,
            n_members,
        }
    }

    /// Return the number of training samples covered.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Return the number of ensemble members covered.
    #[must_use]
    pub fn n_members(&self) -> usize {
        self.n_members
    }

    /// Return `true` if `sample` was out-of-bag for `member`.
    #[must_use]
    pub fn is_oob(&self, sample: usize, member: usize) -> bool {
        self.flags[sample * self.n_members + member]
    }

    /// Iterate the members for which `sample` was out-of-bag.
    pub fn oob_members(&self, sample: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_members).filter(move |&m| self.is_oob(sample, m))
    }

    /// Iterate the samples that were out-of-bag for `member`.
    pub fn oob_samples(&self, member: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_samples).filter(move |&s| self.is_oob(s, member))
    }

    /// Return the number of samples with at least one out-of-bag member.
    #[must_use]
    pub fn n_covered_samples(&self) -> usize {
        (0..self.n_samples)
            .filter(|&s| self.oob_members(s).next().is_some())
            .count()
    }

    /// Return the fraction of (sample, member) pairs that are out-of-bag.
    ///
    /// For full-size bootstraps this converges to `e^-1` (about 0.368) as
    /// the sample count grows.
    #[must_use]
    pub fn density(&self) -> f64 {
        if self.flags.is_empty() {
            return 0.0;
        }
        let set = self.flags.iter().filter(|&&f| f).count();
        set as f64 / self.flags.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_matrix() -> OobMatrix {
        // 3 samples x 2 members.
        let columns = vec![vec![true, false, true], vec![false, false, true]];
        OobMatrix::from_columns(&columns, 3)
    }

    #[test]
    fn flags_round_trip() {
        let m = small_matrix();
        assert_eq!(m.n_samples(), 3);
        assert_eq!(m.n_members(), 2);
        assert!(m.is_oob(0, 0));
        assert!(!m.is_oob(0, 1));
        assert!(!m.is_oob(1, 0));
        assert!(m.is_oob(2, 0) && m.is_oob(2, 1));
    }

    #[test]
    fn iterators_agree_with_flags() {
        let m = small_matrix();
        assert_eq!(m.oob_members(2).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(m.oob_members(1).count(), 0);
        assert_eq!(m.oob_samples(0).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn coverage_and_density() {
        let m = small_matrix();
        // Sample 1 has no out-of-bag member.
        assert_eq!(m.n_covered_samples(), 2);
        assert!((m.density() - 4.0 / 6.0).abs() < 1e-12);
    }
}
