//! Percentile ranks of predicted counts within a background of peaks.

/// Predicted counts at background peaks, kept sorted for ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakBackground {
    sorted_counts: Vec<f64>,
}

impl PeakBackground {
    /// Build from predicted peak counts. Non-finite counts are dropped; returns
    /// `None` when nothing is left to rank against.
    pub fn from_counts<I: IntoIterator<Item = f64>>(counts: I) -> Option<Self> {
        let mut sorted_counts: Vec<f64> = counts.into_iter().filter(|c| c.is_finite()).collect();
        if sorted_counts.is_empty() {
            return None;
        }
        sorted_counts.sort_by(f64::total_cmp);
        Some(Self { sorted_counts })
    }

    /// Number of background peaks.
    pub fn len(&self) -> usize {
        self.sorted_counts.len()
    }

    /// Always false; empty backgrounds are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.sorted_counts.is_empty()
    }

    /// Mean-rank percentile in `[0, 1]`:
    /// `(#{bg < x} + #{bg <= x}) / (2 N)`.
    pub fn percentile(&self, count: f64) -> Option<f64> {
        if !count.is_finite() {
            return None;
        }
        let below = self.sorted_counts.partition_point(|&c| c < count);
        let at_or_below = self.sorted_counts.partition_point(|&c| c <= count);
        Some((below + at_or_below) as f64 / (2 * self.sorted_counts.len()) as f64)
    }

    /// Percentiles for a column of counts.
    pub fn percentiles(&self, counts: &[f64]) -> Vec<Option<f64>> {
        counts.iter().map(|&c| self.percentile(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn background() -> PeakBackground {
        PeakBackground::from_counts((1..=10).map(|c| c as f64 * 10.0)).unwrap()
    }

    #[test]
    fn value_between_peaks_ranks_by_count_below() {
        // three peaks (10, 20, 30) lie below 35
        assert_eq!(background().percentile(35.0), Some(0.3));
    }

    #[test]
    fn ties_take_the_mean_rank() {
        assert_eq!(background().percentile(30.0), Some(0.25));
    }

    #[test]
    fn extremes_map_to_zero_and_one() {
        assert_eq!(background().percentile(0.0), Some(0.0));
        assert_eq!(background().percentile(1e6), Some(1.0));
        assert_eq!(background().percentile(f64::NAN), None);
    }

    #[test]
    fn empty_background_is_rejected() {
        assert!(PeakBackground::from_counts(Vec::new()).is_none());
    }
}
