//! Seeded construction of shuffled/control variant sets and subsamples.
//!
//! Every function takes the RNG explicitly so one seed drives the whole
//! scoring pass.

use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};

use super::Variant;

/// How many shuffled/control variants to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleSpec {
    /// No shuffled set; p-values are not computed.
    #[default]
    Disabled,
    /// Draw exactly this many rows.
    Total(usize),
    /// Draw this many rows per observed variant, with replacement.
    PerVariant(usize),
}

/// A variant drawn into the shuffled/control set.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuffledVariant {
    /// Source variant.
    pub variant: Variant,
    /// Seed forwarded to the model for shuffling this row's sequence context.
    pub shuffle_seed: u64,
}

/// RNG used for all sampling in a scoring pass.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Build the shuffled/control set from the observed variants.
///
/// `Total(t)` samples without replacement when more than `t` variants are
/// available and with replacement otherwise; `PerVariant(k)` samples `n * k`
/// rows with replacement. Each row is tagged with a distinct seed drawn as a
/// permutation of `0..len`.
pub fn build_shuffled_set(variants: &[Variant], spec: ShuffleSpec, rng: &mut StdRng) -> Vec<ShuffledVariant> {
    if variants.is_empty() {
        return Vec::new();
    }

    let picks: Vec<usize> = match spec {
        ShuffleSpec::Disabled => return Vec::new(),
        ShuffleSpec::Total(total) if variants.len() > total => {
            index::sample(rng, variants.len(), total).into_vec()
        }
        ShuffleSpec::Total(total) => with_replacement(rng, variants.len(), total),
        ShuffleSpec::PerVariant(per_variant) => {
            with_replacement(rng, variants.len(), variants.len() * per_variant)
        }
    };

    let mut seeds: Vec<u64> = (0..picks.len() as u64).collect();
    seeds.shuffle(rng);

    picks
        .into_iter()
        .zip(seeds)
        .map(|(idx, shuffle_seed)| ShuffledVariant {
            variant: variants[idx].clone(),
            shuffle_seed,
        })
        .collect()
}

fn with_replacement(rng: &mut StdRng, population: usize, amount: usize) -> Vec<usize> {
    (0..amount).map(|_| rng.random_range(0..population)).collect()
}

/// Keep at most `limit` items, sampled without replacement. Original order is
/// preserved among the kept items.
pub fn subsample<T>(items: Vec<T>, limit: usize, rng: &mut StdRng) -> Vec<T> {
    if items.len() <= limit {
        return items;
    }
    let mut keep = index::sample(rng, items.len(), limit).into_vec();
    keep.sort_unstable();

    let mut keep = keep.into_iter().peekable();
    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            if keep.peek() == Some(&idx) {
                keep.next();
                Some(item)
            } else {
                None
            }
        })
        .collect()
}
