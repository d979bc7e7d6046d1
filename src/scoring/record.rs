//! Score records, the metric catalogue and the finalized score table.

use crate::genomics::{Variant, VariantSchema};

use super::metrics::product;
use super::null::Tail;

/// Statistics that can be tested against an empirical null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Signed log2 fold-change.
    LogFc,
    /// Absolute log2 fold-change.
    AbsLogFc,
    /// Indel-adjusted divergence.
    Jsd,
    /// `logfc * jsd`.
    LogFcXJsd,
    /// `abs_logfc * jsd`.
    AbsLogFcXJsd,
    /// Larger of the two allele percentiles.
    MaxPercentile,
    /// `allele2_percentile - allele1_percentile`.
    PercentileChange,
    /// Absolute percentile change.
    AbsPercentileChange,
    /// `logfc * max_percentile`.
    LogFcXMaxPercentile,
    /// `abs_logfc * max_percentile`.
    AbsLogFcXMaxPercentile,
    /// `jsd * max_percentile`.
    JsdXMaxPercentile,
    /// `logfc_x_jsd * max_percentile`.
    LogFcXJsdXMaxPercentile,
    /// `abs_logfc_x_jsd * max_percentile`.
    AbsLogFcXJsdXMaxPercentile,
}

impl Metric {
    /// Metrics available for every scored variant.
    pub const EFFECT: &'static [Metric] = &[
        Metric::LogFc,
        Metric::AbsLogFc,
        Metric::Jsd,
        Metric::LogFcXJsd,
        Metric::AbsLogFcXJsd,
    ];

    /// Metrics available when a peak background was supplied.
    pub const PERCENTILE: &'static [Metric] = &[
        Metric::MaxPercentile,
        Metric::PercentileChange,
        Metric::AbsPercentileChange,
        Metric::LogFcXMaxPercentile,
        Metric::AbsLogFcXMaxPercentile,
        Metric::JsdXMaxPercentile,
        Metric::LogFcXJsdXMaxPercentile,
        Metric::AbsLogFcXJsdXMaxPercentile,
    ];

    /// Column name.
    pub fn name(self) -> &'static str {
        match self {
            Metric::LogFc => "logfc",
            Metric::AbsLogFc => "abs_logfc",
            Metric::Jsd => "jsd",
            Metric::LogFcXJsd => "logfc_x_jsd",
            Metric::AbsLogFcXJsd => "abs_logfc_x_jsd",
            Metric::MaxPercentile => "max_percentile",
            Metric::PercentileChange => "percentile_change",
            Metric::AbsPercentileChange => "abs_percentile_change",
            Metric::LogFcXMaxPercentile => "logfc_x_max_percentile",
            Metric::AbsLogFcXMaxPercentile => "abs_logfc_x_max_percentile",
            Metric::JsdXMaxPercentile => "jsd_x_max_percentile",
            Metric::LogFcXJsdXMaxPercentile => "logfc_x_jsd_x_max_percentile",
            Metric::AbsLogFcXJsdXMaxPercentile => "abs_logfc_x_jsd_x_max_percentile",
        }
    }

    /// Signed metrics are tested two-tailed, magnitudes right-tailed.
    pub fn tail(self) -> Tail {
        match self {
            Metric::LogFc
            | Metric::LogFcXJsd
            | Metric::PercentileChange
            | Metric::LogFcXMaxPercentile
            | Metric::LogFcXJsdXMaxPercentile => Tail::Both,
            _ => Tail::Right,
        }
    }

    /// Name of the p-value column for this metric.
    pub fn pval_column(self) -> String {
        format!("{}.pval", self.name())
    }
}

/// Fold-change and divergence scores of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EffectScores {
    /// `log2(allele2 / allele1)` of predicted counts.
    pub logfc: Option<f64>,
    /// Absolute fold-change.
    pub abs_logfc: Option<f64>,
    /// Indel-adjusted divergence (equal to `original_jsd` for SNVs).
    pub jsd: Option<f64>,
    /// Naive positional divergence.
    pub original_jsd: Option<f64>,
    /// `logfc * jsd`.
    pub logfc_x_jsd: Option<f64>,
    /// `abs_logfc * jsd`.
    pub abs_logfc_x_jsd: Option<f64>,
}

impl EffectScores {
    /// Derive all products from the three base values.
    pub fn derive(logfc: Option<f64>, jsd: Option<f64>, original_jsd: Option<f64>) -> Self {
        let abs_logfc = logfc.map(f64::abs);
        Self {
            logfc,
            abs_logfc,
            jsd,
            original_jsd,
            logfc_x_jsd: product(logfc, jsd),
            abs_logfc_x_jsd: product(abs_logfc, jsd),
        }
    }
}

/// Peak-relative scores of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PercentileScores {
    /// Percentile of the allele1 count.
    pub allele1_percentile: Option<f64>,
    /// Percentile of the allele2 count.
    pub allele2_percentile: Option<f64>,
    /// Larger allele percentile.
    pub max_percentile: Option<f64>,
    /// `allele2_percentile - allele1_percentile`.
    pub percentile_change: Option<f64>,
    /// Absolute percentile change.
    pub abs_percentile_change: Option<f64>,
    /// `logfc * max_percentile`.
    pub logfc_x_max_percentile: Option<f64>,
    /// `abs_logfc * max_percentile`.
    pub abs_logfc_x_max_percentile: Option<f64>,
    /// `jsd * max_percentile`.
    pub jsd_x_max_percentile: Option<f64>,
    /// `logfc_x_jsd * max_percentile`.
    pub logfc_x_jsd_x_max_percentile: Option<f64>,
    /// `abs_logfc_x_jsd * max_percentile`.
    pub abs_logfc_x_jsd_x_max_percentile: Option<f64>,
}

impl PercentileScores {
    /// Derive composites from the two allele percentiles and the effect scores.
    pub fn derive(allele1: Option<f64>, allele2: Option<f64>, effect: &EffectScores) -> Self {
        let max_percentile = match (allele1, allele2) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        let percentile_change = match (allele1, allele2) {
            (Some(a), Some(b)) => Some(b - a),
            _ => None,
        };
        Self {
            allele1_percentile: allele1,
            allele2_percentile: allele2,
            max_percentile,
            percentile_change,
            abs_percentile_change: percentile_change.map(f64::abs),
            logfc_x_max_percentile: product(effect.logfc, max_percentile),
            abs_logfc_x_max_percentile: product(effect.abs_logfc, max_percentile),
            jsd_x_max_percentile: product(effect.jsd, max_percentile),
            logfc_x_jsd_x_max_percentile: product(effect.logfc_x_jsd, max_percentile),
            abs_logfc_x_jsd_x_max_percentile: product(effect.abs_logfc_x_jsd, max_percentile),
        }
    }
}

/// Every score computed for one variant; shared by observed and shuffled rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowScores {
    /// Fold-change and divergence scores.
    pub effect: EffectScores,
    /// Peak-relative scores, when a background was supplied.
    pub percentile: Option<PercentileScores>,
}

impl RowScores {
    /// Value of a testable metric. Percentile metrics are `None` without a background.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        let effect = &self.effect;
        let pct = self.percentile.as_ref();
        match metric {
            Metric::LogFc => effect.logfc,
            Metric::AbsLogFc => effect.abs_logfc,
            Metric::Jsd => effect.jsd,
            Metric::LogFcXJsd => effect.logfc_x_jsd,
            Metric::AbsLogFcXJsd => effect.abs_logfc_x_jsd,
            Metric::MaxPercentile => pct?.max_percentile,
            Metric::PercentileChange => pct?.percentile_change,
            Metric::AbsPercentileChange => pct?.abs_percentile_change,
            Metric::LogFcXMaxPercentile => pct?.logfc_x_max_percentile,
            Metric::AbsLogFcXMaxPercentile => pct?.abs_logfc_x_max_percentile,
            Metric::JsdXMaxPercentile => pct?.jsd_x_max_percentile,
            Metric::LogFcXJsdXMaxPercentile => pct?.logfc_x_jsd_x_max_percentile,
            Metric::AbsLogFcXJsdXMaxPercentile => pct?.abs_logfc_x_jsd_x_max_percentile,
        }
    }
}

/// Empirical p-values for a fixed group of metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct PvalueGroup {
    metrics: &'static [Metric],
    values: Vec<Option<f64>>,
}

impl PvalueGroup {
    /// Group with one value per metric, in `metrics` order.
    pub fn new(metrics: &'static [Metric], values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(metrics.len(), values.len());
        Self { metrics, values }
    }

    /// P-value of a metric; `None` when the metric is not in the group or its
    /// observation was undefined.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.metrics
            .iter()
            .position(|&m| m == metric)
            .and_then(|idx| self.values[idx])
    }

    /// `(metric, p-value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Option<f64>)> + '_ {
        self.metrics.iter().copied().zip(self.values.iter().copied())
    }
}

/// One output row.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantScoreRecord {
    /// Scored variant.
    pub variant: Variant,
    /// Predicted count for allele1.
    pub allele1_pred_count: f64,
    /// Predicted count for allele2.
    pub allele2_pred_count: f64,
    /// Derived scores.
    pub scores: RowScores,
    /// Present when a shuffled/control set was scored.
    pub effect_pvals: Option<PvalueGroup>,
    /// Present when both a shuffled set and a peak background were scored.
    pub percentile_pvals: Option<PvalueGroup>,
}

/// Which optional column groups a table carries. Absent groups are omitted
/// from the output entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputedGroups {
    /// Effect metric p-values.
    pub effect_pvals: bool,
    /// Percentile scores.
    pub percentiles: bool,
    /// Percentile metric p-values.
    pub percentile_pvals: bool,
}

/// Text columns carried after the computed ones, such as annotations or
/// columns joined in by other tools. Written verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraColumns {
    /// Column names in order.
    pub names: Vec<String>,
    /// Cells per record, one per name.
    pub rows: Vec<Vec<String>>,
}

impl ExtraColumns {
    /// Set a column from one value per row. An existing column of the same
    /// name is overwritten in place; otherwise the column is appended.
    pub fn set(&mut self, name: &str, values: Vec<String>) {
        if self.rows.len() < values.len() {
            self.rows.resize(values.len(), vec![String::new(); self.names.len()]);
        }
        match self.names.iter().position(|n| n == name) {
            Some(col) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    if let Some(cell) = row.get_mut(col) {
                        *cell = value;
                    }
                }
            }
            None => {
                self.names.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Whether no extra columns are carried.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Finalized scores for one model's pass, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    /// Layout of the input columns.
    pub schema: VariantSchema,
    /// Optional column groups present.
    pub groups: ComputedGroups,
    /// Rows in input order.
    pub records: Vec<VariantScoreRecord>,
    /// Pass-through columns written after the computed ones.
    pub extra: ExtraColumns,
}

impl ScoreTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Output column names in order.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.schema.columns().iter().map(|c| c.to_string()).collect();
        columns.extend(
            [
                "allele1_pred_counts",
                "allele2_pred_counts",
                "logfc",
                "abs_logfc",
                "jsd",
                "original_jsd",
                "logfc_x_jsd",
                "abs_logfc_x_jsd",
            ]
            .map(String::from),
        );
        if self.groups.effect_pvals {
            columns.extend(Metric::EFFECT.iter().map(|m| m.pval_column()));
        }
        if self.groups.percentiles {
            columns.extend(["allele1_percentile", "allele2_percentile"].map(String::from));
            columns.extend(Metric::PERCENTILE.iter().map(|m| m.name().to_string()));
        }
        if self.groups.percentile_pvals {
            columns.extend(Metric::PERCENTILE.iter().map(|m| m.pval_column()));
        }
        columns.extend(self.extra.names.iter().cloned());
        columns
    }

    /// Column names written by the scorer, without pass-through columns.
    pub fn computed_columns(schema: VariantSchema, groups: ComputedGroups) -> Vec<String> {
        ScoreTable {
            schema,
            groups,
            records: Vec::new(),
            extra: ExtraColumns::default(),
        }
        .columns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composites_are_literal_products() {
        let effect = EffectScores::derive(Some(-2.0), Some(0.5), Some(0.75));
        assert_eq!(effect.abs_logfc, Some(2.0));
        assert_eq!(effect.logfc_x_jsd, Some(-1.0));
        assert_eq!(effect.abs_logfc_x_jsd, Some(1.0));

        let pct = PercentileScores::derive(Some(0.25), Some(0.75), &effect);
        assert_eq!(pct.max_percentile, Some(0.75));
        assert_eq!(pct.percentile_change, Some(0.5));
        assert_eq!(pct.logfc_x_jsd_x_max_percentile, Some(-0.75));
    }

    #[test]
    fn undefined_factors_propagate() {
        let effect = EffectScores::derive(None, Some(0.5), Some(0.5));
        assert_eq!(effect.abs_logfc_x_jsd, None);
        let pct = PercentileScores::derive(Some(0.1), Some(0.2), &effect);
        assert_eq!(pct.jsd_x_max_percentile, Some(0.1));
        assert_eq!(pct.logfc_x_max_percentile, None);
    }

    #[test]
    fn percentile_metrics_absent_without_background() {
        let row = RowScores {
            effect: EffectScores::derive(Some(1.0), Some(0.1), Some(0.1)),
            percentile: None,
        };
        assert_eq!(row.metric(Metric::LogFc), Some(1.0));
        assert_eq!(row.metric(Metric::MaxPercentile), None);
    }

    #[test]
    fn every_percentile_metric_reads_its_own_field() {
        let row = RowScores {
            effect: EffectScores::derive(Some(1.0), Some(0.1), Some(0.1)),
            percentile: Some(PercentileScores {
                allele1_percentile: Some(0.1),
                allele2_percentile: Some(0.2),
                max_percentile: Some(1.0),
                percentile_change: Some(2.0),
                abs_percentile_change: Some(3.0),
                logfc_x_max_percentile: Some(4.0),
                abs_logfc_x_max_percentile: Some(5.0),
                jsd_x_max_percentile: Some(6.0),
                logfc_x_jsd_x_max_percentile: Some(7.0),
                abs_logfc_x_jsd_x_max_percentile: Some(8.0),
            }),
        };
        let values: Vec<Option<f64>> = Metric::PERCENTILE.iter().map(|&m| row.metric(m)).collect();
        let expected: Vec<Option<f64>> = (1..=8).map(|v| Some(v as f64)).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn extra_columns_append_or_overwrite() {
        let mut extra = ExtraColumns::default();
        extra.set("gene", vec!["A".into(), "B".into()]);
        extra.set("peak_overlap", vec!["True".into(), "False".into()]);
        extra.set("gene", vec!["C".into(), "D".into()]);
        assert_eq!(extra.names, vec!["gene", "peak_overlap"]);
        assert_eq!(extra.rows[1], vec!["D", "False"]);
    }

    #[test]
    fn tails_follow_sign() {
        assert_eq!(Metric::LogFc.tail(), Tail::Both);
        assert_eq!(Metric::AbsLogFc.tail(), Tail::Right);
        assert_eq!(Metric::PercentileChange.tail(), Tail::Both);
        assert_eq!(Metric::JsdXMaxPercentile.tail(), Tail::Right);
        assert_eq!(Metric::Jsd.pval_column(), "jsd.pval");
    }
}
