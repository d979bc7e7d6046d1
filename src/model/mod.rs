//! Interface to the sequence-to-signal model that produces per-allele
//! predictions.
//!
//! The scoring engine never looks inside a model. It builds
//! [`PredictionRequest`]s, hands them to a [`PredictionModel`] in batches and
//! checks that what comes back has the promised shape.

mod table;

pub use table::TablePredictionModel;

use thiserror::Error;

/// Which sequence a prediction is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictionSlot {
    /// Reference allele of a variant.
    Allele1,
    /// Alternate allele of a variant.
    Allele2,
    /// Reference sequence at a background peak summit.
    Peak,
}

impl PredictionSlot {
    /// Name used in prediction tables.
    pub fn name(self) -> &'static str {
        match self {
            PredictionSlot::Allele1 => "allele1",
            PredictionSlot::Allele2 => "allele2",
            PredictionSlot::Peak => "peak",
        }
    }

    /// Parse a slot name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "allele1" => Some(PredictionSlot::Allele1),
            "allele2" => Some(PredictionSlot::Allele2),
            "peak" => Some(PredictionSlot::Peak),
            _ => None,
        }
    }
}

/// Strand handling for predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrandMode {
    /// Forward strand only.
    Forward,
    /// Average of forward and reverse-complement predictions.
    #[default]
    Averaged,
}

impl StrandMode {
    /// Name used in prediction tables.
    pub fn name(self) -> &'static str {
        match self {
            StrandMode::Forward => "forward",
            StrandMode::Averaged => "averaged",
        }
    }

    /// Parse a strand mode name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "forward" => Some(StrandMode::Forward),
            "averaged" => Some(StrandMode::Averaged),
            _ => None,
        }
    }
}

/// One inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest<'a> {
    /// Variant id or peak key.
    pub id: &'a str,
    /// Chromosome of the window.
    pub chrom: &'a str,
    /// 0-based window center.
    pub window_center: u64,
    /// Allele sequence placed at the center (empty for peaks).
    pub allele: &'a str,
    /// What the prediction is for.
    pub slot: PredictionSlot,
    /// Strand handling.
    pub strand: StrandMode,
    /// Set for shuffled/control rows: seed for shuffling the sequence context.
    pub shuffle_seed: Option<u64>,
}

/// Predicted total signal and per-position profile for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Identifier echoed back from the request.
    pub id: String,
    /// Predicted total signal.
    pub count: f64,
    /// Predicted signal per output position.
    pub profile: Vec<f64>,
}

/// Failures reported by a prediction model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model could not be loaded.
    #[error("failed to load model {model}: {message}")]
    Load {
        /// Model name or path.
        model: String,
        /// What went wrong.
        message: String,
    },

    /// The model has no prediction for the request.
    #[error("model {model} has no prediction for {slot} of '{id}'")]
    MissingPrediction {
        /// Model name or path.
        model: String,
        /// Requested id.
        id: String,
        /// Requested slot name.
        slot: &'static str,
    },

    /// Inference itself failed.
    #[error("inference failed in model {model}: {message}")]
    Inference {
        /// Model name or path.
        model: String,
        /// What went wrong.
        message: String,
    },
}

/// A sequence-to-signal model.
///
/// Calls are blocking; a failed call aborts the scoring pass for that model.
pub trait PredictionModel {
    /// Model name used in logs.
    fn name(&self) -> &str;

    /// Input window length in bases.
    fn input_len(&self) -> usize;

    /// Length of every predicted profile.
    fn profile_len(&self) -> usize;

    /// Predict a single request.
    fn predict(&mut self, request: &PredictionRequest<'_>) -> Result<Prediction, ModelError>;

    /// Predict a batch, returning results in request order.
    fn predict_batch(&mut self, requests: &[PredictionRequest<'_>]) -> Result<Vec<Prediction>, ModelError> {
        requests.iter().map(|request| self.predict(request)).collect()
    }
}
