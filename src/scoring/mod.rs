//! Variant effect scoring.
//!
//! Per-allele predictions become fold-change and profile divergence scores
//! (indel-aware), optionally placed against a peak background as percentiles,
//! and optionally calibrated against an empirical null built from a
//! shuffled/control set scored the same way.

mod archive;
mod indel;
mod metrics;
mod null;
mod percentile;
mod record;
mod scorer;
mod table;

pub use archive::{ArchiveError, ArrayGroup, NumericArray, PredictionArchive};
pub use indel::{adjust_indel_jsd, aligned_divergence, IndelAdjustment};
pub use metrics::{batch_jsd, batch_logfc, jsd, logfc, normalize_profile, ProfileMatrix};
pub use null::{NullDistribution, Tail};
pub use percentile::PeakBackground;
pub use record::{
    ComputedGroups, EffectScores, ExtraColumns, Metric, PercentileScores, PvalueGroup, RowScores, ScoreTable,
    VariantScoreRecord,
};
pub use scorer::{
    ensure_ids_match, score_batch, AllelePredictions, BatchScores, NullModel, PeakInput, ScoringError,
    ScoringOutput, VariantScorer,
};
pub use table::{
    read_score_table, render_score_table, write_annotated_score_table, write_score_table,
    write_score_table_file,
};
