//! Compressed archive of raw predictions and intermediate statistics.
//!
//! Layout: named groups holding named numeric arrays, each with an explicit
//! shape. The container is `bincode`-encoded and gzip-compressed at the highest
//! level.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const FORMAT_VERSION: u32 = 1;

/// Errors raised while writing or reading an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// File could not be created, opened or written.
    #[error("archive I/O failed for {path}: {source}")]
    Io {
        /// Offending file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding failed.
    #[error("archive encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    /// An array's data does not match its declared shape.
    #[error("array '{name}' has {len} values but shape {shape:?}")]
    ShapeMismatch {
        /// Array name.
        name: String,
        /// Number of values stored.
        len: usize,
        /// Declared shape.
        shape: Vec<usize>,
    },

    /// Archive was written by an incompatible version.
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u32),
}

/// Dense row-major array with an explicit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericArray {
    /// Dimensions, outermost first.
    pub shape: Vec<usize>,
    /// Row-major values.
    pub data: Vec<f64>,
}

impl NumericArray {
    /// One-dimensional array.
    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// `[rows, cols]` array from row-major values.
    pub fn matrix(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        Self {
            shape: vec![rows, cols],
            data,
        }
    }

    /// One-dimensional array where undefined values are stored as NaN.
    pub fn from_optional(values: &[Option<f64>]) -> Self {
        Self::vector(values.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }

    fn check(&self, name: &str) -> Result<(), ArchiveError> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(ArchiveError::ShapeMismatch {
                name: name.to_string(),
                len: self.data.len(),
                shape: self.shape.clone(),
            });
        }
        Ok(())
    }
}

/// Named arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayGroup {
    /// Arrays by name.
    pub arrays: BTreeMap<String, NumericArray>,
}

impl ArrayGroup {
    /// Add or replace an array.
    pub fn insert(&mut self, name: impl Into<String>, array: NumericArray) {
        self.arrays.insert(name.into(), array);
    }

    /// Array by name.
    pub fn get(&self, name: &str) -> Option<&NumericArray> {
        self.arrays.get(name)
    }
}

/// Hierarchical prediction archive (`observed`, optionally `shuffled`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionArchive {
    version: u32,
    /// Groups by name.
    pub groups: BTreeMap<String, ArrayGroup>,
}

impl PredictionArchive {
    /// Empty archive.
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            groups: BTreeMap::new(),
        }
    }

    /// Mutable access to a group, creating it if needed.
    pub fn group_mut(&mut self, name: &str) -> &mut ArrayGroup {
        self.groups.entry(name.to_string()).or_default()
    }

    /// Group by name.
    pub fn group(&self, name: &str) -> Option<&ArrayGroup> {
        self.groups.get(name)
    }

    fn validate(&self) -> Result<(), ArchiveError> {
        if self.version != FORMAT_VERSION {
            return Err(ArchiveError::UnsupportedVersion(self.version));
        }
        for group in self.groups.values() {
            for (name, array) in &group.arrays {
                array.check(name)?;
            }
        }
        Ok(())
    }

    /// Encode into a writer. The writer is flushed before returning.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), ArchiveError> {
        self.encode(writer, Path::new("<stream>"))
    }

    fn encode<W: Write>(&self, writer: W, path: &Path) -> Result<(), ArchiveError> {
        self.validate()?;
        let io_error = |source: std::io::Error| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut encoder = GzEncoder::new(writer, Compression::best());
        bincode::serialize_into(&mut encoder, self)?;
        let mut inner = encoder.finish().map_err(io_error)?;
        inner.flush().map_err(io_error)
    }

    /// Decode from a reader.
    pub fn read_from<R: Read>(reader: R) -> Result<Self, ArchiveError> {
        let archive: PredictionArchive = bincode::deserialize_from(GzDecoder::new(reader))?;
        archive.validate()?;
        Ok(archive)
    }

    /// Write to a file.
    pub fn write_file(&self, path: &Path) -> Result<(), ArchiveError> {
        let file = File::create(path).map_err(|e| ArchiveError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.encode(BufWriter::new(file), path)
    }

    /// Read from a file.
    pub fn read_file(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|e| ArchiveError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::read_from(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_survives_compression() {
        let mut archive = PredictionArchive::new();
        archive
            .group_mut("observed")
            .insert("allele1_pred_profiles", NumericArray::matrix(2, 2, vec![1.0, 2.0, 3.0, 4.0]));
        archive
            .group_mut("shuffled")
            .insert("shuf_logfc", NumericArray::from_optional(&[Some(0.5), None]));

        let mut bytes = Vec::new();
        archive.write_to(&mut bytes).unwrap();
        let decoded = PredictionArchive::read_from(bytes.as_slice()).unwrap();

        let profiles = decoded.group("observed").unwrap().get("allele1_pred_profiles").unwrap();
        assert_eq!(profiles.shape, vec![2, 2]);
        let logfc = decoded.group("shuffled").unwrap().get("shuf_logfc").unwrap();
        assert_eq!(logfc.data[0], 0.5);
        assert!(logfc.data[1].is_nan());
    }

    /// Accepts every write but fails on flush, like a full disk behind a buffer.
    struct FlushFails(Vec<u8>);

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("no space left on device"))
        }
    }

    #[test]
    fn flush_failure_is_reported() {
        let mut archive = PredictionArchive::new();
        archive
            .group_mut("observed")
            .insert("allele1_pred_counts", NumericArray::vector(vec![1.0, 2.0]));
        let err = archive.write_to(FlushFails(Vec::new())).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn full_device_fails_with_its_path() {
        let path = Path::new("/dev/full");
        if !path.exists() {
            return;
        }
        let mut archive = PredictionArchive::new();
        archive
            .group_mut("observed")
            .insert("allele1_pred_counts", NumericArray::vector(vec![1.0]));
        match archive.write_file(path) {
            Err(ArchiveError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_inconsistent_shapes() {
        let mut archive = PredictionArchive::new();
        archive
            .group_mut("observed")
            .insert("bad", NumericArray::matrix(2, 3, vec![1.0]));
        let err = archive.write_to(Vec::new()).unwrap_err();
        assert!(matches!(err, ArchiveError::ShapeMismatch { .. }));
    }
}
