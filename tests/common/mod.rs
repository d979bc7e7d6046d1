#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use varscore::{ChromSizes, ModelError, Peak, Prediction, PredictionModel, PredictionRequest, PredictionSlot};

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("VARSCORE_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set VARSCORE_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

pub fn chrom_sizes() -> ChromSizes {
    [("chr1", 1_000u64), ("chr2", 500u64)].into_iter().collect()
}

pub fn peak(chrom: &str, start: u64, end: u64, summit: u64, score: f64) -> Peak {
    Peak {
        chrom: chrom.into(),
        start,
        end,
        score,
        summit,
    }
}

type ShuffledFn = Box<dyn Fn(u64, PredictionSlot, usize) -> (f64, Vec<f64>)>;

/// Shuffled rows depend only on their seed: allele1 has count 8 and all
/// signal at position 0; allele2 has count `4 * 2^seed` and all signal at
/// position `seed % 2`.
pub fn seed_only_shuffled(seed: u64, slot: PredictionSlot, profile_len: usize) -> (f64, Vec<f64>) {
    let mut profile = vec![0.0; profile_len];
    match slot {
        PredictionSlot::Allele2 => {
            profile[(seed % 2) as usize] = 1.0;
            (4.0 * 2f64.powi(seed as i32), profile)
        }
        _ => {
            profile[0] = 1.0;
            (8.0, profile)
        }
    }
}

/// Model answering from explicit per-id tables.
pub struct ScriptedModel {
    input_len: usize,
    profile_len: usize,
    observed: HashMap<(String, PredictionSlot), (f64, Vec<f64>)>,
    peaks: HashMap<String, f64>,
    shuffled: ShuffledFn,
    mislabel: Option<(String, String)>,
    pub batches: usize,
    pub requests: usize,
}

impl std::fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("input_len", &self.input_len)
            .field("profile_len", &self.profile_len)
            .finish()
    }
}

impl ScriptedModel {
    pub fn new(input_len: usize, profile_len: usize) -> Self {
        Self {
            input_len,
            profile_len,
            observed: HashMap::new(),
            peaks: HashMap::new(),
            shuffled: Box::new(seed_only_shuffled),
            mislabel: None,
            batches: 0,
            requests: 0,
        }
    }

    pub fn with_variant(
        mut self,
        id: &str,
        allele1: (f64, Vec<f64>),
        allele2: (f64, Vec<f64>),
    ) -> Self {
        self.observed
            .insert((id.to_string(), PredictionSlot::Allele1), allele1);
        self.observed
            .insert((id.to_string(), PredictionSlot::Allele2), allele2);
        self
    }

    pub fn with_peak(mut self, peak: &Peak, count: f64) -> Self {
        self.peaks.insert(peak.key(), count);
        self
    }

    /// Replace the generator answering shuffled requests.
    pub fn with_shuffled(
        mut self,
        shuffled: impl Fn(u64, PredictionSlot, usize) -> (f64, Vec<f64>) + 'static,
    ) -> Self {
        self.shuffled = Box::new(shuffled);
        self
    }

    /// Answer requests for `from` as if they were for `to`.
    pub fn mislabel(mut self, from: &str, to: &str) -> Self {
        self.mislabel = Some((from.to_string(), to.to_string()));
        self
    }
}

impl PredictionModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn input_len(&self) -> usize {
        self.input_len
    }

    fn profile_len(&self) -> usize {
        self.profile_len
    }

    fn predict(&mut self, request: &PredictionRequest<'_>) -> Result<Prediction, ModelError> {
        self.requests += 1;
        let missing = || ModelError::MissingPrediction {
            model: "scripted".to_string(),
            id: request.id.to_string(),
            slot: request.slot.name(),
        };
        let (count, profile) = match (request.slot, request.shuffle_seed) {
            (PredictionSlot::Peak, _) => (*self.peaks.get(request.id).ok_or_else(missing)?, Vec::new()),
            (slot, Some(seed)) => (self.shuffled)(seed, slot, self.profile_len),
            (slot, None) => self
                .observed
                .get(&(request.id.to_string(), slot))
                .cloned()
                .ok_or_else(missing)?,
        };
        let id = match &self.mislabel {
            Some((from, to)) if from == request.id => to.clone(),
            _ => request.id.to_string(),
        };
        Ok(Prediction { id, count, profile })
    }

    fn predict_batch(&mut self, requests: &[PredictionRequest<'_>]) -> Result<Vec<Prediction>, ModelError> {
        self.batches += 1;
        requests.iter().map(|request| self.predict(request)).collect()
    }
}

/// Three scorable variants plus two that fail coordinate filtering, a peak
/// background with counts `[2, 6, 12, 24]` and seed-only shuffled rows.
pub struct GoldenFixture {
    pub variants: Vec<varscore::Variant>,
    pub peaks: Vec<Peak>,
    pub model: ScriptedModel,
}

pub fn golden_fixture() -> GoldenFixture {
    use varscore::Variant;

    let variants = vec![
        Variant::new("rs1", "chr1", 100, 101, "A", "G"),
        Variant::new("rs2", "chr1", 200, 201, "C", "T"),
        Variant::new("rs3", "chr1", 300, 301, "G", "A"),
        Variant::new("edge", "chr1", 2, 3, "A", "C"),
        Variant::new("unplaced", "chrUn", 100, 101, "A", "C"),
    ];

    let background = [
        (peak("chr1", 400, 500, 50, 10.0), 2.0),
        (peak("chr1", 500, 600, 50, 10.0), 6.0),
        (peak("chr1", 600, 700, 50, 10.0), 12.0),
        (peak("chr1", 700, 800, 50, 10.0), 24.0),
    ];
    let mut peaks: Vec<Peak> = background.iter().map(|(p, _)| p.clone()).collect();
    // lower-scoring duplicate and a summit too close to the chromosome end
    peaks.push(peak("chr1", 400, 500, 50, 1.0));
    peaks.push(peak("chr1", 990, 1_000, 8, 5.0));

    let mut model = ScriptedModel::new(10, 4)
        .with_variant("rs1", (8.0, vec![1.0, 0.0, 0.0, 0.0]), (16.0, vec![0.0, 1.0, 0.0, 0.0]))
        .with_variant("rs2", (6.0, vec![1.0; 4]), (6.0, vec![1.0; 4]))
        .with_variant("rs3", (0.0, vec![0.0; 4]), (4.0, vec![1.0, 2.0, 3.0, 4.0]));
    for (peak, count) in &background {
        model = model.with_peak(peak, *count);
    }

    GoldenFixture { variants, peaks, model }
}
