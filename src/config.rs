//! Scoring pass configuration.

use thiserror::Error;

use crate::genomics::{ShuffleSpec, VariantSchema};
use crate::model::StrandMode;

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Batch size of zero.
    #[error("batch size must be > 0")]
    ZeroBatchSize,

    /// Shuffled set size of zero.
    #[error("shuffled set size must be > 0 when enabled")]
    ZeroShuffle,

    /// Debug sample size of zero.
    #[error("debug sample size must be > 0")]
    ZeroDebugSample,

    /// Peak cap of zero.
    #[error("max peaks must be > 0")]
    ZeroMaxPeaks,
}

/// Parameters for one model's scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Layout of the input variant table (drives output columns).
    pub schema: VariantSchema,
    /// Strand handling forwarded to the model.
    pub strand: StrandMode,
    /// Requests per inference call.
    pub batch_size: usize,
    /// Seed for every randomized step of the pass.
    pub random_seed: u64,
    /// Shuffled/control set construction.
    pub shuffle: ShuffleSpec,
    /// Only score variants on this chromosome.
    pub chrom: Option<String>,
    /// Subsample observed, shuffled and peak sets to this size.
    pub debug_sample: Option<usize>,
    /// Subsample the peak background to at most this many peaks.
    pub max_peaks: Option<usize>,
}

impl ScoringConfig {
    /// Defaults: averaged strands, batch of 64, seed 1234, no shuffled set.
    pub fn new(schema: VariantSchema) -> Self {
        Self {
            schema,
            strand: StrandMode::Averaged,
            batch_size: 64,
            random_seed: 1234,
            shuffle: ShuffleSpec::Disabled,
            chrom: None,
            debug_sample: None,
            max_peaks: None,
        }
    }

    /// Set requests per inference call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Set shuffled/control set construction.
    pub fn with_shuffle(mut self, shuffle: ShuffleSpec) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Predict the forward strand only.
    pub fn with_forward_only(mut self, forward_only: bool) -> Self {
        self.strand = if forward_only {
            StrandMode::Forward
        } else {
            StrandMode::Averaged
        };
        self
    }

    /// Restrict scoring to one chromosome.
    pub fn with_chrom(mut self, chrom: Option<String>) -> Self {
        self.chrom = chrom;
        self
    }

    /// Enable debug subsampling.
    pub fn with_debug_sample(mut self, size: Option<usize>) -> Self {
        self.debug_sample = size;
        self
    }

    /// Cap the peak background.
    pub fn with_max_peaks(mut self, max_peaks: Option<usize>) -> Self {
        self.max_peaks = max_peaks;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if matches!(self.shuffle, ShuffleSpec::Total(0) | ShuffleSpec::PerVariant(0)) {
            return Err(ConfigError::ZeroShuffle);
        }
        if self.debug_sample == Some(0) {
            return Err(ConfigError::ZeroDebugSample);
        }
        if self.max_peaks == Some(0) {
            return Err(ConfigError::ZeroMaxPeaks);
        }
        Ok(())
    }
}
