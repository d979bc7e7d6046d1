use std::collections::HashMap;
use std::sync::Arc;

/// Layout of an input variant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantSchema {
    /// `chr pos end allele1 allele2 variant_id`, 0-based half-open.
    Bed,
    /// `chr pos allele1 allele2 variant_id`, 1-based point position.
    Chrombpnet,
}

impl VariantSchema {
    /// Input column names in table order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            VariantSchema::Bed => &["chr", "pos", "end", "allele1", "allele2", "variant_id"],
            VariantSchema::Chrombpnet => &["chr", "pos", "allele1", "allele2", "variant_id"],
        }
    }

    /// Schema name as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            VariantSchema::Bed => "bed",
            VariantSchema::Chrombpnet => "chrombpnet",
        }
    }
}

/// Shape of a variant: same-length substitution or length-changing indel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    /// Reference and alternate alleles have equal length.
    Snv,
    /// Reference and alternate alleles differ in length.
    Indel {
        /// Length of the reference allele.
        ref_len: usize,
        /// Length of the alternate allele.
        alt_len: usize,
    },
}

impl VariantKind {
    /// Classify a variant from its allele sequences.
    pub fn classify(allele1: &str, allele2: &str) -> Self {
        let ref_len = allele_len(allele1);
        let alt_len = allele_len(allele2);
        if ref_len == alt_len {
            VariantKind::Snv
        } else {
            VariantKind::Indel { ref_len, alt_len }
        }
    }

    /// Whether the alleles differ in length.
    pub fn is_indel(self) -> bool {
        matches!(self, VariantKind::Indel { .. })
    }
}

/// Allele length with `-` and empty cells standing for the empty sequence.
pub fn allele_len(allele: &str) -> usize {
    if allele == "-" {
        0
    } else {
        allele.len()
    }
}

/// A scored variant, stored in 0-based half-open coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Unique identifier.
    pub id: Arc<str>,
    /// Chromosome/contig name.
    pub chrom: Arc<str>,
    /// 0-based start.
    pub start: u64,
    /// Half-open end.
    pub end: u64,
    /// Reference allele (`allele1`).
    pub allele1: String,
    /// Alternate allele (`allele2`).
    pub allele2: String,
}

impl Variant {
    /// Construct a variant from 0-based coordinates.
    pub fn new(
        id: impl Into<Arc<str>>,
        chrom: impl Into<Arc<str>>,
        start: u64,
        end: u64,
        allele1: impl Into<String>,
        allele2: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            chrom: chrom.into(),
            start,
            end,
            allele1: allele1.into(),
            allele2: allele2.into(),
        }
    }

    /// Construct a variant from a 1-based point position; `end` is derived from
    /// the reference allele length.
    pub fn from_one_based(
        id: impl Into<Arc<str>>,
        chrom: impl Into<Arc<str>>,
        pos: u64,
        allele1: impl Into<String>,
        allele2: impl Into<String>,
    ) -> Self {
        let allele1 = allele1.into();
        let start = pos.saturating_sub(1);
        let end = start + allele_len(&allele1) as u64;
        Self::new(id, chrom, start, end, allele1, allele2)
    }

    /// SNV/indel tag for this variant.
    pub fn kind(&self) -> VariantKind {
        VariantKind::classify(&self.allele1, &self.allele2)
    }

    /// Whether the window of `input_len` bases centered on the variant start
    /// fits inside the chromosome.
    pub fn window_fits(&self, input_len: usize, chrom_sizes: &ChromSizes) -> bool {
        chrom_sizes.window_fits(&self.chrom, self.start, input_len)
    }
}

/// Chromosome name to length lookup.
#[derive(Debug, Clone, Default)]
pub struct ChromSizes {
    sizes: HashMap<Arc<str>, u64>,
}

impl ChromSizes {
    /// Empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chromosome length.
    pub fn insert(&mut self, chrom: impl Into<Arc<str>>, size: u64) {
        self.sizes.insert(chrom.into(), size);
    }

    /// Length of a chromosome if known.
    pub fn get(&self, chrom: &str) -> Option<u64> {
        self.sizes.get(chrom).copied()
    }

    /// Number of chromosomes.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Whether no chromosomes are registered.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Whether `[center - L/2, center + L/2]` lies inside the chromosome.
    pub fn window_fits(&self, chrom: &str, center: u64, input_len: usize) -> bool {
        let Some(size) = self.get(chrom) else {
            return false;
        };
        let flank = (input_len / 2) as u64;
        center >= flank && center.checked_add(flank).is_some_and(|end| end <= size)
    }
}

impl<S: Into<Arc<str>>> FromIterator<(S, u64)> for ChromSizes {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut sizes = ChromSizes::new();
        for (chrom, size) in iter {
            sizes.insert(chrom, size);
        }
        sizes
    }
}

/// A narrowPeak record used as part of the percentile background.
#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    /// Chromosome/contig name.
    pub chrom: Arc<str>,
    /// 0-based start.
    pub start: u64,
    /// Half-open end.
    pub end: u64,
    /// Peak score (narrowPeak column 5), used to break duplicates.
    pub score: f64,
    /// Summit offset from `start`.
    pub summit: u64,
}

impl Peak {
    /// Absolute summit coordinate.
    pub fn summit_position(&self) -> u64 {
        self.start.saturating_add(self.summit)
    }

    /// Identifier used when requesting predictions for this peak.
    pub fn key(&self) -> String {
        format!("{}:{}-{}:{}", self.chrom, self.start, self.end, self.summit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("A", "G", VariantKind::Snv ; "substitution")]
    #[test_case("A", "ATTT", VariantKind::Indel { ref_len: 1, alt_len: 4 } ; "insertion")]
    #[test_case("ACG", "A", VariantKind::Indel { ref_len: 3, alt_len: 1 } ; "deletion")]
    #[test_case("-", "T", VariantKind::Indel { ref_len: 0, alt_len: 1 } ; "dash insertion")]
    fn classifies_variant_kind(allele1: &str, allele2: &str, expected: VariantKind) {
        assert_eq!(VariantKind::classify(allele1, allele2), expected);
    }

    #[test]
    fn one_based_positions_become_half_open() {
        let variant = Variant::from_one_based("rs1", "chr1", 101, "ACG", "A");
        assert_eq!(variant.start, 100);
        assert_eq!(variant.end, 103);
        assert!(variant.kind().is_indel());
    }

    #[test]
    fn window_must_fit_inside_chromosome() {
        let sizes: ChromSizes = [("chr1", 1_000u64)].into_iter().collect();
        assert!(sizes.window_fits("chr1", 500, 1000));
        assert!(!sizes.window_fits("chr1", 499, 1000));
        assert!(!sizes.window_fits("chr1", 501, 1000));
        assert!(!sizes.window_fits("chr2", 500, 10));
    }

    #[test]
    fn window_near_u64_max_does_not_overflow() {
        let sizes: ChromSizes = [("chrHuge", u64::MAX)].into_iter().collect();
        assert!(!sizes.window_fits("chrHuge", u64::MAX - 1, 10));
        assert!(sizes.window_fits("chrHuge", u64::MAX - 5, 10));
    }
}
