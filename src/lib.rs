//! # Variant Effect Scoring
//!
//! Scores genetic variants with a sequence-to-signal model: each variant is
//! predicted once per allele, and the two predictions are compared.
//!
//! ## Scores
//!
//! 1. **Fold-change**: `log2(allele2 / allele1)` of predicted total signal
//! 2. **Profile divergence**: Jensen-Shannon divergence (bits) between the
//!    normalized allele profiles, corrected for indels
//! 3. **Peak percentiles**: where each allele's count falls among predicted
//!    counts at background peaks
//! 4. **Empirical p-values**: every score ranked against the same score on a
//!    shuffled/control set, with +1 smoothing
//!
//! ## Usage Example
//!
//! ```ignore
//! use varscore::{ScoringConfig, TablePredictionModel, VariantScorer, VariantSchema, ShuffleSpec};
//!
//! let mut model = TablePredictionModel::from_path("model.preds.tsv".as_ref())?;
//! let config = ScoringConfig::new(VariantSchema::Bed).with_shuffle(ShuffleSpec::Total(100_000));
//! let output = VariantScorer::new(&mut model, config)?.run(variants, &chrom_sizes, None)?;
//! write_score_table_file("scores.tsv".as_ref(), &output.table)?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod config;   // Scoring pass parameters
pub mod genomics; // Variants, peaks, chromosome sizes, sampling
pub mod model;    // Prediction model seam
pub mod scoring;  // Metrics, null calibration, outputs

// Re-exports for convenience
pub use config::{ConfigError, ScoringConfig};
pub use genomics::{
    read_chrom_sizes, read_peaks, read_variant_table, ChromSizes, Peak, ShuffleSpec, TableError, Variant,
    VariantKind, VariantSchema,
};
pub use model::{ModelError, Prediction, PredictionModel, PredictionRequest, PredictionSlot, StrandMode, TablePredictionModel};
pub use scoring::{
    read_score_table, write_score_table, write_score_table_file, Metric, PredictionArchive, ScoreTable,
    ScoringError, ScoringOutput, VariantScorer,
};
