use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use super::{ModelError, Prediction, PredictionModel, PredictionRequest, PredictionSlot, StrandMode};

type PredictionKey = (String, PredictionSlot, Option<u64>);

/// Model backed by precomputed predictions stored in a TSV file.
///
/// ```text
/// #input_len=2114
/// id      slot     shuffle_seed  count  profile
/// rs1     allele1  .             12.5   0.1,0.4,0.3,...
/// rs1     allele2  .             20.0   0.2,0.2,0.5,...
/// rs1     allele1  17            11.0   ...
/// chr1:100-600:250  peak  .      40.0   .
/// ```
///
/// Rows are keyed by `(id, slot, shuffle_seed)`. An optional
/// `#strand=forward|averaged` header declares how the predictions were made;
/// requests for the other mode are rejected. Without it the table serves any
/// mode and a forward-only request is logged as unverifiable.
#[derive(Debug, Clone)]
pub struct TablePredictionModel {
    name: String,
    input_len: usize,
    profile_len: usize,
    strand: Option<StrandMode>,
    warned_strand: bool,
    predictions: HashMap<PredictionKey, (f64, Vec<f64>)>,
}

impl TablePredictionModel {
    /// Load a prediction table from disk.
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let name = path.display().to_string();
        let load_error = |message: String| ModelError::Load {
            model: name.clone(),
            message,
        };

        let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
        let mut input_len = None;
        let mut profile_len = None;
        let mut strand = None;
        let mut predictions = HashMap::new();

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| load_error(e.to_string()))?;
            let line_no = idx + 1;
            if let Some(value) = line.strip_prefix("#input_len=") {
                let parsed = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| load_error(format!("line {line_no}: invalid input_len '{value}'")))?;
                input_len = Some(parsed);
                continue;
            }
            if let Some(value) = line.strip_prefix("#strand=") {
                strand = Some(
                    StrandMode::parse(value.trim())
                        .ok_or_else(|| load_error(format!("line {line_no}: unknown strand mode '{value}'")))?,
                );
                continue;
            }
            if line.trim().is_empty() || line.starts_with('#') || line.starts_with("id\t") {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 5 {
                return Err(load_error(format!("line {line_no}: expected 5 columns, found {}", fields.len())));
            }
            let slot = PredictionSlot::parse(fields[1])
                .ok_or_else(|| load_error(format!("line {line_no}: unknown slot '{}'", fields[1])))?;
            let shuffle_seed = match fields[2] {
                "." | "" => None,
                seed => Some(
                    seed.parse::<u64>()
                        .map_err(|_| load_error(format!("line {line_no}: invalid shuffle_seed '{seed}'")))?,
                ),
            };
            let count = fields[3]
                .parse::<f64>()
                .map_err(|_| load_error(format!("line {line_no}: invalid count '{}'", fields[3])))?;
            let profile = match fields[4] {
                "." if slot == PredictionSlot::Peak => Vec::new(),
                values => values
                    .split(',')
                    .map(|v| v.trim().parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| load_error(format!("line {line_no}: invalid profile")))?,
            };

            // peak rows only contribute counts
            if slot != PredictionSlot::Peak {
                match profile_len {
                    None => profile_len = Some(profile.len()),
                    Some(expected) if expected != profile.len() => {
                        return Err(load_error(format!(
                            "line {line_no}: profile length {} differs from {expected}",
                            profile.len()
                        )));
                    }
                    Some(_) => {}
                }
            }
            predictions.insert((fields[0].to_string(), slot, shuffle_seed), (count, profile));
        }

        let input_len = input_len.ok_or_else(|| load_error("missing '#input_len=' header".to_string()))?;

        Ok(Self {
            name,
            input_len,
            profile_len: profile_len.unwrap_or(0),
            strand,
            warned_strand: false,
            predictions,
        })
    }

    /// Build an in-memory table model.
    pub fn from_records(
        name: impl Into<String>,
        input_len: usize,
        profile_len: usize,
        records: impl IntoIterator<Item = (String, PredictionSlot, Option<u64>, f64, Vec<f64>)>,
    ) -> Self {
        let predictions = records
            .into_iter()
            .map(|(id, slot, seed, count, profile)| ((id, slot, seed), (count, profile)))
            .collect();
        Self {
            name: name.into(),
            input_len,
            profile_len,
            strand: None,
            warned_strand: false,
            predictions,
        }
    }

    /// Declare the strand mode the stored predictions were made with.
    pub fn with_strand(mut self, strand: StrandMode) -> Self {
        self.strand = Some(strand);
        self
    }

    /// Declared strand mode, if any.
    pub fn strand(&self) -> Option<StrandMode> {
        self.strand
    }

    fn check_strand(&mut self, requested: StrandMode) -> Result<(), ModelError> {
        match self.strand {
            Some(declared) if declared != requested => Err(ModelError::Inference {
                model: self.name.clone(),
                message: format!(
                    "table holds {} predictions, {} requested",
                    declared.name(),
                    requested.name()
                ),
            }),
            None if requested == StrandMode::Forward && !self.warned_strand => {
                self.warned_strand = true;
                warn!(
                    model = %self.name,
                    "forward-only requested but the table declares no strand mode; serving stored predictions"
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Number of stored predictions.
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    /// Whether the table holds no predictions.
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

impl PredictionModel for TablePredictionModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_len(&self) -> usize {
        self.input_len
    }

    fn profile_len(&self) -> usize {
        self.profile_len
    }

    fn predict(&mut self, request: &PredictionRequest<'_>) -> Result<Prediction, ModelError> {
        self.check_strand(request.strand)?;
        let key = (request.id.to_string(), request.slot, request.shuffle_seed);
        let (count, profile) = self
            .predictions
            .get(&key)
            .ok_or_else(|| ModelError::MissingPrediction {
                model: self.name.clone(),
                id: request.id.to_string(),
                slot: request.slot.name(),
            })?;
        Ok(Prediction {
            id: request.id.to_string(),
            count: *count,
            profile: profile.clone(),
        })
    }
}
