//! Genomic inputs of the scoring engine: variants, chromosome sizes, peaks,
//! the readers that load them and the seeded samplers that build the
//! shuffled/control set.

mod annotate;
mod io;
mod shuffle;
mod types;

pub use annotate::{peak_overlap, PeakIndex};
pub use io::{dedup_peaks, read_chrom_sizes, read_peaks, read_variant_table, TableError};
pub use shuffle::{build_shuffled_set, seeded_rng, subsample, ShuffleSpec, ShuffledVariant};
pub use types::{allele_len, ChromSizes, Peak, Variant, VariantKind, VariantSchema};
