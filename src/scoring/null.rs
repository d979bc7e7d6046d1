//! Empirical p-values against a background of shuffled/control variants.

/// Direction of the alternative hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    /// Large values are extreme.
    Right,
    /// Small values are extreme.
    Left,
    /// Both directions are extreme.
    Both,
}

/// Sorted background values of one statistic.
///
/// Undefined and non-finite values are dropped on construction, so `len()` is
/// the number of values that actually take part in ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct NullDistribution {
    sorted: Vec<f64>,
}

impl NullDistribution {
    /// Build from per-variant background values. Returns `None` when no finite
    /// value remains.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut sorted: Vec<f64> = values
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        Some(Self { sorted })
    }

    /// Number of background values.
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    /// Always false; empty backgrounds are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// `(#{null >= x} + 1) / (N + 1)`.
    pub fn right_pval(&self, observed: f64) -> f64 {
        let below = self.sorted.partition_point(|&v| v < observed);
        self.smoothed(self.sorted.len() - below)
    }

    /// `(#{null <= x} + 1) / (N + 1)`.
    pub fn left_pval(&self, observed: f64) -> f64 {
        let at_or_below = self.sorted.partition_point(|&v| v <= observed);
        self.smoothed(at_or_below)
    }

    /// P-value of one observation; `None` when the observation is undefined.
    pub fn pval(&self, observed: Option<f64>, tail: Tail) -> Option<f64> {
        let observed = observed.filter(|v| !v.is_nan())?;
        Some(match tail {
            Tail::Right => self.right_pval(observed),
            Tail::Left => self.left_pval(observed),
            Tail::Both => (2.0 * self.right_pval(observed).min(self.left_pval(observed))).min(1.0),
        })
    }

    /// P-values for a column of observations.
    pub fn pvals(&self, observed: &[Option<f64>], tail: Tail) -> Vec<Option<f64>> {
        observed.iter().map(|&value| self.pval(value, tail)).collect()
    }

    fn smoothed(&self, extreme: usize) -> f64 {
        (extreme + 1) as f64 / (self.sorted.len() + 1) as f64
    }
}
