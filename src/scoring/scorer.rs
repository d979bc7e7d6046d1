use std::collections::HashMap;

use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ScoringConfig};
use crate::genomics::{
    build_shuffled_set, dedup_peaks, seeded_rng, subsample, ChromSizes, Peak, ShuffledVariant, Variant,
    VariantKind,
};
use crate::model::{ModelError, Prediction, PredictionModel, PredictionRequest, PredictionSlot};

use super::archive::{NumericArray, PredictionArchive};
use super::indel::adjust_indel_jsd;
use super::metrics::{batch_jsd, batch_logfc, ProfileMatrix};
use super::null::NullDistribution;
use super::percentile::PeakBackground;
use super::record::{
    ComputedGroups, EffectScores, ExtraColumns, Metric, PercentileScores, PvalueGroup, RowScores, ScoreTable,
    VariantScoreRecord,
};

/// Errors that abort a model's scoring pass.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Configuration rejected before any inference.
    #[error("invalid scoring configuration: {0}")]
    Config(#[from] ConfigError),

    /// Inference failed.
    #[error("prediction failed: {0}")]
    Model(#[from] ModelError),

    /// The model answered a batch with the wrong number of predictions.
    #[error("model {model} returned {returned} predictions for {requested} requests")]
    BatchLength {
        /// Model name.
        model: String,
        /// Requests sent.
        requested: usize,
        /// Predictions received.
        returned: usize,
    },

    /// A profile had a different length than the model declares.
    #[error("profile for '{id}' has length {found}, model declares {expected}")]
    ProfileLength {
        /// Offending id.
        id: String,
        /// Declared profile length.
        expected: usize,
        /// Returned profile length.
        found: usize,
    },

    /// Predicted rows are not in one-to-one input order.
    #[error("prediction row {row} is for '{found}' but input row is '{expected}'")]
    IdentifierMismatch {
        /// 0-based row.
        row: usize,
        /// Input variant id.
        expected: String,
        /// Id attached to the prediction.
        found: String,
    },
}

/// Per-allele predictions for a batch, in request order.
///
/// Counts have shape `[n]`; profiles have shape `[n, profile_len]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AllelePredictions {
    /// Id echoed by the model for each row.
    pub ids: Vec<String>,
    /// Allele1 predicted counts.
    pub counts_ref: Vec<f64>,
    /// Allele2 predicted counts.
    pub counts_alt: Vec<f64>,
    /// Allele1 predicted profiles.
    pub profiles_ref: ProfileMatrix,
    /// Allele2 predicted profiles.
    pub profiles_alt: ProfileMatrix,
}

impl AllelePredictions {
    /// Empty batch for a given profile length.
    pub fn with_profile_len(profile_len: usize) -> Self {
        Self {
            ids: Vec::new(),
            counts_ref: Vec::new(),
            counts_alt: Vec::new(),
            profiles_ref: ProfileMatrix::with_profile_len(profile_len),
            profiles_alt: ProfileMatrix::with_profile_len(profile_len),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Scores of every row of a batch plus the rows the indel adjuster touched.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchScores {
    /// One entry per row.
    pub rows: Vec<RowScores>,
    /// Rows whose divergence was indel-adjusted.
    pub indel_rows: Vec<usize>,
}

impl BatchScores {
    /// Column of a metric over all rows.
    pub fn column(&self, metric: Metric) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.metric(metric)).collect()
    }
}

/// Score a batch: fold-change, naive divergence, indel adjustment, then
/// percentiles when a background is supplied.
///
/// Observed and shuffled batches go through this same function so their
/// statistics are directly comparable.
pub fn score_batch(
    kinds: &[VariantKind],
    predictions: &AllelePredictions,
    background: Option<&PeakBackground>,
) -> BatchScores {
    let logfc = batch_logfc(&predictions.counts_ref, &predictions.counts_alt);
    let naive = batch_jsd(&predictions.profiles_ref, &predictions.profiles_alt);
    let adjusted = adjust_indel_jsd(kinds, &predictions.profiles_ref, &predictions.profiles_alt, &naive);

    let percentiles = background.map(|bg| {
        (
            bg.percentiles(&predictions.counts_ref),
            bg.percentiles(&predictions.counts_alt),
        )
    });

    let rows = (0..predictions.len())
        .map(|row| {
            let effect = EffectScores::derive(logfc[row], adjusted.jsd[row], naive[row]);
            let percentile = percentiles
                .as_ref()
                .map(|(p1, p2)| PercentileScores::derive(p1[row], p2[row], &effect));
            RowScores { effect, percentile }
        })
        .collect();

    BatchScores {
        rows,
        indel_rows: adjusted.indel_rows,
    }
}

/// Empirical null distributions, one per testable metric.
#[derive(Debug, Clone, Default)]
pub struct NullModel {
    distributions: HashMap<Metric, NullDistribution>,
}

impl NullModel {
    /// Build nulls for `metrics` from a scored shuffled batch. Metrics whose
    /// background has no defined value are left out.
    pub fn from_batch(batch: &BatchScores, metrics: &[Metric]) -> Self {
        let mut distributions = HashMap::new();
        for &metric in metrics {
            match NullDistribution::from_values(batch.rows.iter().map(|row| row.metric(metric))) {
                Some(null) => {
                    distributions.insert(metric, null);
                }
                None => warn!(metric = metric.name(), "null distribution has no defined values"),
            }
        }
        Self { distributions }
    }

    /// Null distribution of a metric.
    pub fn get(&self, metric: Metric) -> Option<&NullDistribution> {
        self.distributions.get(&metric)
    }

    /// P-values of one row for a group of metrics.
    pub fn pvalues(&self, metrics: &'static [Metric], row: &RowScores) -> PvalueGroup {
        let values = metrics
            .iter()
            .map(|&metric| {
                self.get(metric)
                    .and_then(|null| null.pval(row.metric(metric), metric.tail()))
            })
            .collect();
        PvalueGroup::new(metrics, values)
    }
}

/// Everything produced by one model's scoring pass.
#[derive(Debug, Clone)]
pub struct ScoringOutput {
    /// Final score table in input order.
    pub table: ScoreTable,
    /// Raw predictions and shuffled statistics.
    pub archive: PredictionArchive,
    /// Number of shuffled/control variants scored.
    pub shuffled_variants: usize,
    /// Number of peaks in the percentile background.
    pub background_peaks: usize,
}

/// Peak set and the chromosome sizes used to validate it.
#[derive(Debug, Clone, Copy)]
pub struct PeakInput<'a> {
    /// Raw narrowPeak rows, possibly with duplicates.
    pub peaks: &'a [Peak],
    /// Chromosome sizes for the peak genome.
    pub chrom_sizes: &'a ChromSizes,
}

/// Runs a scoring pass for one model.
#[derive(Debug)]
pub struct VariantScorer<'m, M: PredictionModel> {
    model: &'m mut M,
    config: ScoringConfig,
}

impl<'m, M: PredictionModel> VariantScorer<'m, M> {
    /// Create a scorer; rejects invalid configuration before any inference.
    pub fn new(model: &'m mut M, config: ScoringConfig) -> Result<Self, ScoringError> {
        config.validate()?;
        Ok(Self { model, config })
    }

    /// Keep variants on the configured chromosome whose window fits the genome.
    pub fn filter_variants(&self, variants: Vec<Variant>, chrom_sizes: &ChromSizes) -> Vec<Variant> {
        let input_len = self.model.input_len();
        variants
            .into_iter()
            .filter(|v| self.config.chrom.as_deref().map_or(true, |c| v.chrom.as_ref() == c))
            .filter(|v| v.window_fits(input_len, chrom_sizes))
            .collect()
    }

    /// Score `variants` against an optional shuffled set and peak background.
    pub fn run(
        &mut self,
        variants: Vec<Variant>,
        chrom_sizes: &ChromSizes,
        peaks: Option<PeakInput<'_>>,
    ) -> Result<ScoringOutput, ScoringError> {
        let mut rng = seeded_rng(self.config.random_seed);
        info!(model = self.model.name(), variants = variants.len(), "original variants table");

        let mut variants = self.filter_variants(variants, chrom_sizes);
        info!(variants = variants.len(), "valid variants after coordinate filtering");

        let mut shuffled = build_shuffled_set(&variants, self.config.shuffle, &mut rng);
        if let Some(size) = self.config.debug_sample {
            shuffled = subsample(shuffled, size, &mut rng);
        }
        info!(shuffled = shuffled.len(), "shuffled variants table");
        let shuffled_predictions = if shuffled.is_empty() {
            None
        } else {
            Some(self.predict_shuffled(&shuffled)?)
        };

        let background = match peaks {
            Some(input) => self.peak_background(input, &mut rng)?,
            None => None,
        };

        let shuffled_scores = shuffled_predictions.as_ref().map(|preds| {
            let kinds: Vec<VariantKind> = shuffled.iter().map(|s| s.variant.kind()).collect();
            score_batch(&kinds, preds, background.as_ref())
        });

        if let Some(size) = self.config.debug_sample {
            variants = subsample(variants, size, &mut rng);
            debug!(variants = variants.len(), "debug variants table");
        }

        let observed = self.predict_observed(&variants)?;
        ensure_ids_match(&variants, &observed.ids)?;

        let kinds: Vec<VariantKind> = variants.iter().map(Variant::kind).collect();
        let scores = score_batch(&kinds, &observed, background.as_ref());
        if !scores.indel_rows.is_empty() {
            info!(indels = scores.indel_rows.len(), "adjusted divergence for indel variants");
        }

        let null_model = shuffled_scores.as_ref().map(|batch| {
            let metrics: Vec<Metric> = if background.is_some() {
                Metric::EFFECT.iter().chain(Metric::PERCENTILE).copied().collect()
            } else {
                Metric::EFFECT.to_vec()
            };
            NullModel::from_batch(batch, &metrics)
        });
        if null_model.is_none() {
            info!("no shuffled variants; p-value columns omitted");
        }

        let groups = ComputedGroups {
            effect_pvals: null_model.is_some(),
            percentiles: background.is_some(),
            percentile_pvals: null_model.is_some() && background.is_some(),
        };

        let records = variants
            .into_iter()
            .zip(scores.rows.iter())
            .enumerate()
            .map(|(row, (variant, scores))| VariantScoreRecord {
                variant,
                allele1_pred_count: observed.counts_ref[row],
                allele2_pred_count: observed.counts_alt[row],
                scores: *scores,
                effect_pvals: null_model.as_ref().map(|null| null.pvalues(Metric::EFFECT, scores)),
                percentile_pvals: null_model
                    .as_ref()
                    .filter(|_| groups.percentile_pvals)
                    .map(|null| null.pvalues(Metric::PERCENTILE, scores)),
            })
            .collect();

        let archive = build_archive(&observed, shuffled_predictions.as_ref().zip(shuffled_scores.as_ref()), groups);

        Ok(ScoringOutput {
            table: ScoreTable {
                schema: self.config.schema,
                groups,
                records,
                extra: ExtraColumns::default(),
            },
            archive,
            shuffled_variants: shuffled.len(),
            background_peaks: background.as_ref().map_or(0, PeakBackground::len),
        })
    }

    fn peak_background(
        &mut self,
        input: PeakInput<'_>,
        rng: &mut StdRng,
    ) -> Result<Option<PeakBackground>, ScoringError> {
        let input_len = self.model.input_len();
        info!(peaks = input.peaks.len(), "original peak table");
        let mut peaks: Vec<Peak> = dedup_peaks(input.peaks.to_vec())
            .into_iter()
            .filter(|p| input.chrom_sizes.window_fits(&p.chrom, p.summit_position(), input_len))
            .collect();
        info!(peaks = peaks.len(), "de-duplicated peak table");

        if let Some(size) = self.config.debug_sample {
            peaks = subsample(peaks, size, rng);
        }
        if let Some(max_peaks) = self.config.max_peaks {
            if peaks.len() > max_peaks {
                peaks = subsample(peaks, max_peaks, rng);
                info!(peaks = peaks.len(), "subsampled peak table");
            }
        }

        let counts = self.predict_peaks(&peaks)?;
        let background = PeakBackground::from_counts(counts);
        if background.is_none() {
            warn!("peak background is empty; percentile columns omitted");
        }
        Ok(background)
    }

    fn predict_observed(&mut self, variants: &[Variant]) -> Result<AllelePredictions, ScoringError> {
        let rows: Vec<(&Variant, Option<u64>)> = variants.iter().map(|v| (v, None)).collect();
        self.predict_alleles(&rows)
    }

    fn predict_shuffled(&mut self, shuffled: &[ShuffledVariant]) -> Result<AllelePredictions, ScoringError> {
        let rows: Vec<(&Variant, Option<u64>)> = shuffled
            .iter()
            .map(|s| (&s.variant, Some(s.shuffle_seed)))
            .collect();
        self.predict_alleles(&rows)
    }

    fn predict_alleles(&mut self, rows: &[(&Variant, Option<u64>)]) -> Result<AllelePredictions, ScoringError> {
        let profile_len = self.model.profile_len();
        let strand = self.config.strand;
        let mut predictions = AllelePredictions::with_profile_len(profile_len);

        for chunk in rows.chunks(self.config.batch_size) {
            let requests: Vec<PredictionRequest<'_>> = chunk
                .iter()
                .flat_map(|&(variant, shuffle_seed)| {
                    [
                        (PredictionSlot::Allele1, variant.allele1.as_str()),
                        (PredictionSlot::Allele2, variant.allele2.as_str()),
                    ]
                    .map(move |(slot, allele)| PredictionRequest {
                        id: &variant.id,
                        chrom: &variant.chrom,
                        window_center: variant.start,
                        allele,
                        slot,
                        strand,
                        shuffle_seed,
                    })
                })
                .collect();

            let results = self.checked_batch(&requests, predictions.len(), 2)?;
            for pair in results.chunks_exact(2) {
                let (ref_pred, alt_pred) = (&pair[0], &pair[1]);
                if ref_pred.id != alt_pred.id {
                    return Err(ScoringError::IdentifierMismatch {
                        row: predictions.len(),
                        expected: ref_pred.id.clone(),
                        found: alt_pred.id.clone(),
                    });
                }
                predictions.ids.push(ref_pred.id.clone());
                predictions.counts_ref.push(ref_pred.count);
                predictions.counts_alt.push(alt_pred.count);
                predictions.profiles_ref.push_row(&ref_pred.profile);
                predictions.profiles_alt.push_row(&alt_pred.profile);
            }
        }
        Ok(predictions)
    }

    fn predict_peaks(&mut self, peaks: &[Peak]) -> Result<Vec<f64>, ScoringError> {
        let keys: Vec<String> = peaks.iter().map(Peak::key).collect();
        let strand = self.config.strand;
        let mut counts = Vec::with_capacity(peaks.len());

        for (peak_chunk, key_chunk) in peaks
            .chunks(self.config.batch_size)
            .zip(keys.chunks(self.config.batch_size))
        {
            let requests: Vec<PredictionRequest<'_>> = peak_chunk
                .iter()
                .zip(key_chunk)
                .map(|(peak, key)| PredictionRequest {
                    id: key,
                    chrom: &peak.chrom,
                    window_center: peak.summit_position(),
                    allele: "",
                    slot: PredictionSlot::Peak,
                    strand,
                    shuffle_seed: None,
                })
                .collect();
            let results = self.checked_batch(&requests, counts.len(), 1)?;
            counts.extend(results.into_iter().map(|p| p.count));
        }
        Ok(counts)
    }

    /// Run one inference call and check batch length, ids and profile lengths.
    /// `first_row` and `per_row` map a request back to its input row.
    fn checked_batch(
        &mut self,
        requests: &[PredictionRequest<'_>],
        first_row: usize,
        per_row: usize,
    ) -> Result<Vec<Prediction>, ScoringError> {
        let results = self.model.predict_batch(requests)?;
        if results.len() != requests.len() {
            return Err(ScoringError::BatchLength {
                model: self.model.name().to_string(),
                requested: requests.len(),
                returned: results.len(),
            });
        }
        let expected = self.model.profile_len();
        for (idx, (request, result)) in requests.iter().zip(&results).enumerate() {
            if result.id != request.id {
                return Err(ScoringError::IdentifierMismatch {
                    row: first_row + idx / per_row,
                    expected: request.id.to_string(),
                    found: result.id.clone(),
                });
            }
            if request.slot != PredictionSlot::Peak && result.profile.len() != expected {
                return Err(ScoringError::ProfileLength {
                    id: result.id.clone(),
                    expected,
                    found: result.profile.len(),
                });
            }
        }
        Ok(results)
    }
}

/// Predicted rows must be the input variants, one-to-one, in input order.
pub fn ensure_ids_match(variants: &[Variant], predicted: &[String]) -> Result<(), ScoringError> {
    if variants.len() != predicted.len() {
        return Err(ScoringError::IdentifierMismatch {
            row: variants.len().min(predicted.len()),
            expected: variants
                .get(predicted.len())
                .map(|v| v.id.to_string())
                .unwrap_or_default(),
            found: predicted.get(variants.len()).cloned().unwrap_or_default(),
        });
    }
    for (row, (variant, id)) in variants.iter().zip(predicted).enumerate() {
        if variant.id.as_ref() != id.as_str() {
            return Err(ScoringError::IdentifierMismatch {
                row,
                expected: variant.id.to_string(),
                found: id.clone(),
            });
        }
    }
    Ok(())
}

fn build_archive(
    observed: &AllelePredictions,
    shuffled: Option<(&AllelePredictions, &BatchScores)>,
    groups: ComputedGroups,
) -> PredictionArchive {
    let mut archive = PredictionArchive::new();
    let group = archive.group_mut("observed");
    group.insert("allele1_pred_counts", NumericArray::vector(observed.counts_ref.clone()));
    group.insert("allele2_pred_counts", NumericArray::vector(observed.counts_alt.clone()));
    for (name, profiles) in [
        ("allele1_pred_profiles", &observed.profiles_ref),
        ("allele2_pred_profiles", &observed.profiles_alt),
    ] {
        group.insert(
            name,
            NumericArray::matrix(profiles.rows(), profiles.cols(), profiles.as_slice().to_vec()),
        );
    }

    if let Some((predictions, scores)) = shuffled {
        let group = archive.group_mut("shuffled");
        group.insert("shuf_allele1_pred_counts", NumericArray::vector(predictions.counts_ref.clone()));
        group.insert("shuf_allele2_pred_counts", NumericArray::vector(predictions.counts_alt.clone()));
        let percentile_metrics: &[Metric] = if groups.percentiles { Metric::PERCENTILE } else { &[] };
        for &metric in Metric::EFFECT.iter().chain(percentile_metrics) {
            group.insert(
                format!("shuf_{}", metric.name()),
                NumericArray::from_optional(&scores.column(metric)),
            );
        }
    }
    archive
}

#[cfg(test)]
mod tests {
    use super::*;

    type Row = (&'static str, f64, f64, Vec<f64>, Vec<f64>);

    fn predictions(rows: Vec<Row>) -> AllelePredictions {
        let mut preds = AllelePredictions::with_profile_len(rows[0].3.len());
        for (id, c1, c2, p1, p2) in rows {
            preds.ids.push(id.to_string());
            preds.counts_ref.push(c1);
            preds.counts_alt.push(c2);
            preds.profiles_ref.push_row(&p1);
            preds.profiles_alt.push_row(&p2);
        }
        preds
    }

    #[test]
    fn batch_scores_carry_products_and_percentiles() {
        let preds = predictions(vec![("rs1", 10.0, 40.0, vec![1.0, 0.0], vec![0.0, 1.0])]);
        let background = PeakBackground::from_counts([5.0, 20.0, 30.0, 50.0]).unwrap();
        let scores = score_batch(&[VariantKind::Snv], &preds, Some(&background));
        let row = &scores.rows[0];

        assert_eq!(row.effect.logfc, Some(2.0));
        assert!((row.effect.jsd.unwrap() - 1.0).abs() < 1e-12);
        let pct = row.percentile.unwrap();
        assert_eq!(pct.allele1_percentile, Some(0.25));
        assert_eq!(pct.allele2_percentile, Some(0.75));
        assert_eq!(pct.max_percentile, Some(0.75));
        assert_eq!(pct.percentile_change, Some(0.5));
    }

    #[test]
    fn degenerate_rows_stay_undefined() {
        let preds = predictions(vec![("rs1", 0.0, 4.0, vec![0.0, 0.0], vec![1.0, 1.0])]);
        let scores = score_batch(&[VariantKind::Snv], &preds, None);
        assert_eq!(scores.rows[0].effect.logfc, None);
        assert_eq!(scores.rows[0].effect.jsd, None);
        assert!(scores.rows[0].percentile.is_none());
    }

    #[test]
    fn null_model_skips_empty_metrics() {
        let preds = predictions(vec![
            ("s1", 0.0, 1.0, vec![1.0], vec![1.0]),
            ("s2", 1.0, 2.0, vec![1.0], vec![1.0]),
        ]);
        let scores = score_batch(&[VariantKind::Snv, VariantKind::Snv], &preds, None);
        let null = NullModel::from_batch(&scores, Metric::EFFECT);
        assert_eq!(null.get(Metric::LogFc).map(NullDistribution::len), Some(1));
        assert_eq!(null.get(Metric::Jsd).map(NullDistribution::len), Some(2));
    }

    #[test]
    fn id_order_mismatch_is_fatal() {
        let variants = vec![
            Variant::new("a", "chr1", 1, 2, "A", "G"),
            Variant::new("b", "chr1", 3, 4, "A", "G"),
        ];
        let swapped = vec!["b".to_string(), "a".to_string()];
        assert!(matches!(
            ensure_ids_match(&variants, &swapped),
            Err(ScoringError::IdentifierMismatch { row: 0, .. })
        ));
        let short = vec!["a".to_string()];
        assert!(ensure_ids_match(&variants, &short).is_err());
        let same = vec!["a".to_string(), "b".to_string()];
        assert!(ensure_ids_match(&variants, &same).is_ok());
    }
}
