//! Peak overlap annotation of scored variants.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Peak, Variant};

/// Peak intervals per chromosome, sorted by start with a running maximum of
/// ends so an overlap query is two binary searches.
#[derive(Debug, Clone, Default)]
pub struct PeakIndex {
    by_chrom: HashMap<Arc<str>, ChromIntervals>,
}

#[derive(Debug, Clone, Default)]
struct ChromIntervals {
    starts: Vec<u64>,
    max_end: Vec<u64>,
}

impl PeakIndex {
    /// Index a peak set. Duplicates are harmless.
    pub fn new(peaks: &[Peak]) -> Self {
        let mut grouped: HashMap<Arc<str>, Vec<(u64, u64)>> = HashMap::new();
        for peak in peaks {
            grouped
                .entry(Arc::clone(&peak.chrom))
                .or_default()
                .push((peak.start, peak.end));
        }

        let by_chrom = grouped
            .into_iter()
            .map(|(chrom, mut intervals)| {
                intervals.sort_unstable();
                let mut running = 0u64;
                let max_end = intervals
                    .iter()
                    .map(|&(_, end)| {
                        running = running.max(end);
                        running
                    })
                    .collect();
                let starts = intervals.into_iter().map(|(start, _)| start).collect();
                (chrom, ChromIntervals { starts, max_end })
            })
            .collect();
        Self { by_chrom }
    }

    /// Whether half-open `[start, end)` overlaps any indexed peak.
    pub fn overlaps(&self, chrom: &str, start: u64, end: u64) -> bool {
        let Some(intervals) = self.by_chrom.get(chrom) else {
            return false;
        };
        // peaks starting before `end` are candidates; any of them reaching past `start` overlaps
        let candidates = intervals.starts.partition_point(|&s| s < end);
        candidates > 0 && intervals.max_end[candidates - 1] > start
    }

    /// Whether a variant overlaps any peak. An empty reference allele counts
    /// as the single base at the variant start.
    pub fn overlaps_variant(&self, variant: &Variant) -> bool {
        let end = variant.end.max(variant.start + 1);
        self.overlaps(&variant.chrom, variant.start, end)
    }
}

/// `peak_overlap` flag for each variant, in order.
pub fn peak_overlap<'a, I>(variants: I, peaks: &[Peak]) -> Vec<bool>
where
    I: IntoIterator<Item = &'a Variant>,
{
    let index = PeakIndex::new(peaks);
    variants.into_iter().map(|v| index.overlaps_variant(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn peaks() -> Vec<Peak> {
        vec![
            Peak { chrom: "chr1".into(), start: 100, end: 200, score: 1.0, summit: 50 },
            Peak { chrom: "chr1".into(), start: 150, end: 160, score: 1.0, summit: 5 },
            Peak { chrom: "chr1".into(), start: 500, end: 600, score: 1.0, summit: 50 },
        ]
    }

    #[test_case(99, 100, false ; "ends at peak start")]
    #[test_case(99, 101, true ; "touches first base")]
    #[test_case(199, 200, true ; "last base")]
    #[test_case(200, 201, false ; "starts at peak end")]
    #[test_case(300, 400, false ; "between peaks")]
    #[test_case(450, 700, true ; "spans peak")]
    fn half_open_overlap(start: u64, end: u64, expected: bool) {
        assert_eq!(PeakIndex::new(&peaks()).overlaps("chr1", start, end), expected);
    }

    #[test]
    fn nested_peak_does_not_hide_longer_one() {
        // the short peak at 150..160 starts later but the 100..200 peak still covers 180
        assert!(PeakIndex::new(&peaks()).overlaps("chr1", 180, 181));
    }

    #[test]
    fn unknown_chromosome_never_overlaps() {
        assert!(!PeakIndex::new(&peaks()).overlaps("chr2", 0, 1_000));
    }

    #[test]
    fn flags_variants_in_order() {
        let variants = [
            Variant::from_one_based("in", "chr1", 120, "A", "G"),
            Variant::from_one_based("out", "chr1", 300, "A", "G"),
            Variant::from_one_based("ins", "chr1", 550, "-", "T"),
        ];
        assert_eq!(peak_overlap(&variants, &peaks()), vec![true, false, true]);
    }
}
