use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::{allele_len, ChromSizes, Peak, Variant, VariantSchema};

/// Errors raised while reading tabular inputs.
#[derive(Debug, Error)]
pub enum TableError {
    /// File could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A row could not be parsed.
    #[error("{path}:{line}: {message}")]
    Malformed {
        /// Offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the row.
        message: String,
    },

    /// Two rows share a variant identifier.
    #[error("{path}: duplicate variant id '{id}'")]
    DuplicateId {
        /// Offending file.
        path: PathBuf,
        /// Repeated identifier.
        id: String,
    },
}

impl TableError {
    pub(crate) fn malformed(path: &Path, line: usize, message: impl Into<String>) -> Self {
        TableError::Malformed {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        TableError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Open a file and hand back its non-empty, non-comment lines with 1-based numbers.
fn data_lines(path: &Path) -> Result<Vec<(usize, String)>, TableError> {
    let file = File::open(path).map_err(|e| TableError::io(path, e))?;
    data_lines_from(BufReader::new(file), path)
}

fn data_lines_from<R: Read>(reader: BufReader<R>, path: &Path) -> Result<Vec<(usize, String)>, TableError> {
    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| TableError::io(path, e))?;
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push((idx + 1, trimmed.to_string()));
    }
    Ok(lines)
}

fn parse_field<T: std::str::FromStr>(
    path: &Path,
    line: usize,
    name: &str,
    value: &str,
) -> Result<T, TableError> {
    value
        .trim()
        .parse()
        .map_err(|_| TableError::malformed(path, line, format!("invalid {name} '{value}'")))
}

fn normalize_allele(allele: &str) -> String {
    let allele = allele.trim();
    if allele.is_empty() {
        "-".to_string()
    } else {
        allele.to_ascii_uppercase()
    }
}

/// Read a variant table in the given schema.
///
/// Variants come back in file order, converted to 0-based half-open
/// coordinates. A first row whose first field is `chr` is treated as a header.
pub fn read_variant_table(path: &Path, schema: VariantSchema) -> Result<Vec<Variant>, TableError> {
    let lines = data_lines(path)?;
    let columns = schema.columns().len();
    let mut variants = Vec::with_capacity(lines.len());
    let mut seen = HashSet::new();

    for (position, (line_no, line)) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        if position == 0 && fields.first().map(|f| f.trim()) == Some("chr") {
            continue;
        }
        if fields.len() < columns {
            return Err(TableError::malformed(
                path,
                *line_no,
                format!("expected {columns} columns for {} schema, found {}", schema.name(), fields.len()),
            ));
        }

        let chrom: Arc<str> = Arc::from(fields[0].trim());
        let variant = match schema {
            VariantSchema::Bed => {
                let start: u64 = parse_field(path, *line_no, "pos", fields[1])?;
                let end: u64 = parse_field(path, *line_no, "end", fields[2])?;
                if end < start {
                    return Err(TableError::malformed(path, *line_no, "end precedes pos"));
                }
                let allele1 = normalize_allele(fields[3]);
                let ref_len = allele_len(&allele1) as u64;
                if end - start != ref_len {
                    return Err(TableError::malformed(
                        path,
                        *line_no,
                        format!("interval {start}-{end} does not span allele1 '{allele1}' ({ref_len} bp)"),
                    ));
                }
                Variant::new(fields[5].trim(), chrom, start, end, allele1, normalize_allele(fields[4]))
            }
            VariantSchema::Chrombpnet => {
                let pos: u64 = parse_field(path, *line_no, "pos", fields[1])?;
                if pos == 0 {
                    return Err(TableError::malformed(path, *line_no, "1-based pos must be > 0"));
                }
                Variant::from_one_based(
                    fields[4].trim(),
                    chrom,
                    pos,
                    normalize_allele(fields[2]),
                    normalize_allele(fields[3]),
                )
            }
        };

        if !seen.insert(Arc::clone(&variant.id)) {
            return Err(TableError::DuplicateId {
                path: path.to_path_buf(),
                id: variant.id.to_string(),
            });
        }
        variants.push(variant);
    }

    Ok(variants)
}

/// Read a two-column `chrom size` table.
pub fn read_chrom_sizes(path: &Path) -> Result<ChromSizes, TableError> {
    let mut sizes = ChromSizes::new();
    for (line_no, line) in data_lines(path)? {
        let mut fields = line.split_whitespace();
        let chrom = fields
            .next()
            .ok_or_else(|| TableError::malformed(path, line_no, "missing chromosome"))?;
        let size = fields
            .next()
            .ok_or_else(|| TableError::malformed(path, line_no, "missing size"))?;
        sizes.insert(chrom, parse_field(path, line_no, "size", size)?);
    }
    Ok(sizes)
}

/// Read a narrowPeak file (10 columns, no header).
pub fn read_peaks(path: &Path) -> Result<Vec<Peak>, TableError> {
    let mut peaks = Vec::new();
    for (line_no, line) in data_lines(path)? {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 10 {
            return Err(TableError::malformed(
                path,
                line_no,
                format!("expected 10 narrowPeak columns, found {}", fields.len()),
            ));
        }
        peaks.push(Peak {
            chrom: Arc::from(fields[0].trim()),
            start: parse_field(path, line_no, "start", fields[1])?,
            end: parse_field(path, line_no, "end", fields[2])?,
            score: parse_field(path, line_no, "score", fields[4])?,
            summit: parse_field(path, line_no, "summit", fields[9])?,
        });
    }
    Ok(peaks)
}

/// Drop duplicate peaks sharing `(chr, start, end, summit)`, keeping the
/// highest-scoring row. Output is sorted by coordinate.
pub fn dedup_peaks(peaks: Vec<Peak>) -> Vec<Peak> {
    let mut best: HashMap<(Arc<str>, u64, u64, u64), Peak> = HashMap::new();
    for peak in peaks {
        let key = (Arc::clone(&peak.chrom), peak.start, peak.end, peak.summit);
        match best.get(&key) {
            Some(existing) if existing.score >= peak.score => {}
            _ => {
                best.insert(key, peak);
            }
        }
    }

    let mut deduped: Vec<Peak> = best.into_values().collect();
    deduped.sort_by(|a, b| {
        a.chrom
            .cmp(&b.chrom)
            .then(a.start.cmp(&b.start))
            .then(a.end.cmp(&b.end))
            .then(a.summit.cmp(&b.summit))
    });
    deduped
}
