//! Divergence correction for variants whose alleles differ in length.
//!
//! Both allele profiles cover the same number of output positions, centered on
//! the variant start. Past the breakpoint the longer allele's profile is shifted
//! by the length difference, so positional comparison there is meaningless.
//! The adjusted divergence drops the extra positions from the longer allele and
//! the same number of tail positions from the shorter one, then compares what
//! remains.

use std::ops::Range;

use crate::genomics::VariantKind;

use super::metrics::{jsd, ProfileMatrix};

/// Result of running the adjuster over a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct IndelAdjustment {
    /// Rows that were recognised as indels.
    pub indel_rows: Vec<usize>,
    /// Divergence per row: adjusted for indels, passed through otherwise.
    pub jsd: Vec<Option<f64>>,
}

impl IndelAdjustment {
    /// Whether any row was adjusted.
    pub fn has_indels(&self) -> bool {
        !self.indel_rows.is_empty()
    }
}

/// Position ranges kept from the longer and shorter allele profiles.
fn kept_ranges(profile_len: usize, ref_len: usize, alt_len: usize) -> (Vec<Range<usize>>, Range<usize>) {
    let mid = profile_len / 2;
    let shift = ref_len.abs_diff(alt_len);
    let breakpoint = (mid + ref_len.min(alt_len)).min(profile_len);
    let resume = (breakpoint + shift).min(profile_len);

    let longer = vec![0..breakpoint, resume..profile_len];
    let shorter = 0..breakpoint + (profile_len - resume);
    (longer, shorter)
}

fn gather(profile: &[f64], ranges: &[Range<usize>]) -> Vec<f64> {
    ranges
        .iter()
        .flat_map(|range| profile[range.clone()].iter().copied())
        .collect()
}

/// Divergence between the two allele profiles, aligned according to the
/// variant kind. SNVs compare positions directly.
pub fn aligned_divergence(kind: VariantKind, profile_ref: &[f64], profile_alt: &[f64]) -> Option<f64> {
    match kind {
        VariantKind::Snv => jsd(profile_ref, profile_alt),
        VariantKind::Indel { ref_len, alt_len } => {
            if profile_ref.len() != profile_alt.len() {
                return None;
            }
            let (longer, shorter) = kept_ranges(profile_ref.len(), ref_len, alt_len);
            let (ref_kept, alt_kept) = if ref_len > alt_len {
                (gather(profile_ref, &longer), profile_alt[shorter].to_vec())
            } else {
                (profile_ref[shorter].to_vec(), gather(profile_alt, &longer))
            };
            jsd(&ref_kept, &alt_kept)
        }
    }
}

/// Replace the divergence of indel rows with the aligned divergence; other rows
/// keep the value from `divergence`.
pub fn adjust_indel_jsd(
    kinds: &[VariantKind],
    profiles_ref: &ProfileMatrix,
    profiles_alt: &ProfileMatrix,
    divergence: &[Option<f64>],
) -> IndelAdjustment {
    debug_assert_eq!(kinds.len(), divergence.len());
    debug_assert_eq!(profiles_ref.rows(), kinds.len());
    debug_assert_eq!(profiles_alt.rows(), kinds.len());

    let mut indel_rows = Vec::new();
    let jsd = kinds
        .iter()
        .enumerate()
        .map(|(row, &kind)| {
            if kind.is_indel() {
                indel_rows.push(row);
                aligned_divergence(kind, profiles_ref.row(row), profiles_alt.row(row))
            } else {
                divergence[row]
            }
        })
        .collect();

    IndelAdjustment { indel_rows, jsd }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::metrics::batch_jsd;

    fn matrix(rows: &[&[f64]]) -> ProfileMatrix {
        let mut m = ProfileMatrix::with_profile_len(rows[0].len());
        for row in rows {
            assert!(m.push_row(row));
        }
        m
    }

    const REF: [f64; 10] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
    // Three inserted positions right after the anchor base at index 5.
    const INSERTED: [f64; 10] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 50.0, 50.0, 50.0, 7.0];

    #[test]
    fn kept_ranges_match_in_length() {
        let (longer, shorter) = kept_ranges(10, 1, 4);
        assert_eq!(longer, vec![0..6, 9..10]);
        assert_eq!(shorter, 0..7);
    }

    #[test]
    fn insertion_realigns_downstream_signal() {
        let kind = VariantKind::classify("A", "ATTT");
        let naive = jsd(&REF, &INSERTED).unwrap();
        let adjusted = aligned_divergence(kind, &REF, &INSERTED).unwrap();
        assert!(naive > 0.1);
        assert!(adjusted.abs() < 1e-12);
    }

    #[test]
    fn deletion_is_symmetric_to_insertion() {
        let kind = VariantKind::classify("ATTT", "A");
        let adjusted = aligned_divergence(kind, &INSERTED, &REF).unwrap();
        assert!(adjusted.abs() < 1e-12);
    }

    #[test]
    fn shift_past_window_end_compares_upstream_only() {
        let kind = VariantKind::Indel { ref_len: 1, alt_len: 40 };
        assert_eq!(aligned_divergence(kind, &REF, &INSERTED), Some(0.0));
        assert_eq!(aligned_divergence(kind, &[], &[]), None);
    }

    #[test]
    fn snv_rows_are_untouched_and_adjustment_is_idempotent() {
        let refs = matrix(&[&REF, &REF]);
        let alts = matrix(&[&INSERTED, &INSERTED]);
        let kinds = [VariantKind::classify("A", "G"), VariantKind::classify("A", "ATTT")];
        let naive = batch_jsd(&refs, &alts);

        let first = adjust_indel_jsd(&kinds, &refs, &alts, &naive);
        assert_eq!(first.indel_rows, vec![1]);
        assert_eq!(first.jsd[0], naive[0]);
        assert_ne!(first.jsd[1], naive[1]);

        let second = adjust_indel_jsd(&kinds, &refs, &alts, &first.jsd);
        assert_eq!(first, second);
    }
}
