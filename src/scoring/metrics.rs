//! Fold-change and divergence between the two alleles of a variant.
//!
//! Divergence is the Jensen-Shannon divergence in bits, so it lies in
//! `[0, 1]`. Undefined values are `None` and stay `None` through every
//! downstream product and ranking.

/// Shape-checked pair of allele profile matrices, each `[num_variants, profile_len]`
/// stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMatrix {
    values: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl ProfileMatrix {
    /// Empty matrix with a fixed profile length.
    pub fn with_profile_len(cols: usize) -> Self {
        Self {
            values: Vec::new(),
            rows: 0,
            cols,
        }
    }

    /// Append one profile. Returns `false` and leaves the matrix untouched when
    /// the length does not match.
    pub fn push_row(&mut self, profile: &[f64]) -> bool {
        if profile.len() != self.cols {
            return false;
        }
        self.values.extend_from_slice(profile);
        self.rows += 1;
        true
    }

    /// Number of profiles.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Profile length.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Profile of row `idx`.
    pub fn row(&self, idx: usize) -> &[f64] {
        &self.values[idx * self.cols..(idx + 1) * self.cols]
    }

    /// Iterate over profiles in row order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |idx| self.row(idx))
    }

    /// Flat row-major values.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// `log2(count_alt / count_ref)`; `None` unless both counts are positive and finite.
pub fn logfc(count_ref: f64, count_alt: f64) -> Option<f64> {
    if !(count_ref.is_finite() && count_alt.is_finite()) || count_ref <= 0.0 || count_alt <= 0.0 {
        return None;
    }
    Some((count_alt / count_ref).log2())
}

/// Profile scaled to sum to one; `None` for negative, non-finite or zero-sum input.
pub fn normalize_profile(profile: &[f64]) -> Option<Vec<f64>> {
    if profile.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return None;
    }
    let total: f64 = profile.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    Some(profile.iter().map(|v| v / total).collect())
}

/// Jensen-Shannon divergence (base 2) between two equally long profiles.
pub fn jsd(profile_ref: &[f64], profile_alt: &[f64]) -> Option<f64> {
    if profile_ref.len() != profile_alt.len() || profile_ref.is_empty() {
        return None;
    }
    let p = normalize_profile(profile_ref)?;
    let q = normalize_profile(profile_alt)?;

    let mut divergence = 0.0;
    for (&pi, &qi) in p.iter().zip(q.iter()) {
        let mi = 0.5 * (pi + qi);
        if pi > 0.0 {
            divergence += 0.5 * pi * (pi / mi).log2();
        }
        if qi > 0.0 {
            divergence += 0.5 * qi * (qi / mi).log2();
        }
    }
    Some(divergence.clamp(0.0, 1.0))
}

/// `log2` fold-change for every variant in a batch.
pub fn batch_logfc(counts_ref: &[f64], counts_alt: &[f64]) -> Vec<Option<f64>> {
    debug_assert_eq!(counts_ref.len(), counts_alt.len());
    counts_ref
        .iter()
        .zip(counts_alt)
        .map(|(&c1, &c2)| logfc(c1, c2))
        .collect()
}

/// Naive positional divergence for every variant in a batch.
pub fn batch_jsd(profiles_ref: &ProfileMatrix, profiles_alt: &ProfileMatrix) -> Vec<Option<f64>> {
    debug_assert_eq!(profiles_ref.rows(), profiles_alt.rows());
    profiles_ref
        .iter_rows()
        .zip(profiles_alt.iter_rows())
        .map(|(p, q)| jsd(p, q))
        .collect()
}

/// Product of two optional scalars.
pub(crate) fn product(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? * b?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1.0, 2.0, Some(1.0) ; "doubling")]
    #[test_case(8.0, 2.0, Some(-2.0) ; "quartering")]
    #[test_case(0.0, 2.0, None ; "zero reference")]
    #[test_case(3.0, -1.0, None ; "negative alternate")]
    #[test_case(f64::NAN, 1.0, None ; "nan reference")]
    fn logfc_cases(c1: f64, c2: f64, expected: Option<f64>) {
        assert_eq!(logfc(c1, c2), expected);
    }

    #[test]
    fn disjoint_profiles_reach_one_bit() {
        let value = jsd(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!((value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_profiles_have_zero_divergence() {
        assert_eq!(jsd(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), Some(0.0));
    }

    #[test]
    fn zero_sum_profile_is_undefined() {
        assert_eq!(jsd(&[0.0, 0.0], &[1.0, 1.0]), None);
        assert_eq!(jsd(&[1.0, -1.0], &[1.0, 1.0]), None);
    }

    #[test]
    fn known_divergence_value() {
        // p = (1/2, 1/2), q = (1, 0): m = (3/4, 1/4)
        let expected = 0.5 * (0.5 * (0.5f64 / 0.75).log2() + 0.5 * (0.5f64 / 0.25).log2())
            + 0.5 * (1.0f64 / 0.75).log2();
        let value = jsd(&[1.0, 1.0], &[1.0, 0.0]).unwrap();
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn matrix_rejects_wrong_length() {
        let mut matrix = ProfileMatrix::with_profile_len(3);
        assert!(matrix.push_row(&[1.0, 2.0, 3.0]));
        assert!(!matrix.push_row(&[1.0]));
        assert_eq!(matrix.rows(), 1);
        assert_eq!(matrix.row(0), &[1.0, 2.0, 3.0]);
    }
}
