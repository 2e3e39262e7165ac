//! Canonical record types and the persisted dataset file.
//!
//! The dataset is a single JSON array on disk. It is the only source of truth;
//! every in-memory view (filtered or cached) is a disposable copy.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Metric name for word error rate (lower is better).
pub const WER: &str = "wer";
/// Metric name for BLEU (higher is better).
pub const BLEU: &str = "bleu";
/// Key of the identifier in a stored record; never a metric name.
pub const RUN_ID: &str = "run_id";

/// Identifier of one evaluation run: `<model_name>_<hash>`.
///
/// The split happens at the last underscore, so model names may contain
/// underscores of their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(model_name: &str, hash: &str) -> Self {
        Self(format!("{model_name}_{hash}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the last underscore, or the whole id when there is none.
    pub fn model_name(&self) -> &str {
        match self.0.rsplit_once('_') {
            Some((model, _)) => model,
            None => &self.0,
        }
    }

    /// The hash suffix after the last underscore.
    pub fn hash(&self) -> Option<&str> {
        self.0.rsplit_once('_').map(|(_, hash)| hash)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One run's normalized metrics. Serialized flat: `{"run_id": ..., "bleu": ..., "wer": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub run_id: RunId,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
}

impl Record {
    pub fn new(run_id: RunId, metrics: BTreeMap<String, f64>) -> Self {
        Self { run_id, metrics }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn wer(&self) -> Option<f64> {
        self.metric(WER)
    }

    pub fn bleu(&self) -> Option<f64> {
        self.metric(BLEU)
    }
}

/// Ordered sequence of records. Order is not meaningful to consumers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    #[cfg(feature = "serve")]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Subsequence of records whose run_id is in `run_ids`, in dataset order.
    pub fn filter(&self, run_ids: &HashSet<String>) -> Dataset {
        Dataset::new(
            self.records
                .iter()
                .filter(|r| run_ids.contains(r.run_id.as_str()))
                .cloned()
                .collect(),
        )
    }

    /// Fails on the first run_id that appears more than once.
    pub fn ensure_unique(&self) -> Result<(), CollisionError> {
        let mut seen = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if !seen.insert(record.run_id.as_str()) {
                return Err(CollisionError {
                    run_id: record.run_id.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Read the persisted dataset. A missing file is reported as [`MissingDatasetError`].
pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DatasetError::Missing(MissingDatasetError {
                path: path.to_path_buf(),
            }));
        }
        Err(e) => {
            return Err(DatasetError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let dataset: Dataset = serde_json::from_str(&contents).map_err(|e| DatasetError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), records = dataset.len(), "loaded dataset");
    Ok(dataset)
}

/// Render the dataset the way it is stored on disk: 4-space indent, trailing newline.
pub fn to_json_bytes(dataset: &Dataset) -> Result<Vec<u8>, DatasetError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    dataset
        .serialize(&mut ser)
        .map_err(|e| DatasetError::Serialize { source: e })?;
    buf.push(b'\n');
    Ok(buf)
}

/// Overwrite the dataset file in full, creating its directory if needed.
///
/// Writes to a temp file in the same directory, then renames over the target
/// so readers never observe a partial dataset. The replacement keeps the old
/// file's permissions; a new file is world-readable (0644 on Unix).
pub fn save_dataset(dataset: &Dataset, path: &Path) -> Result<(), DatasetError> {
    let bytes = to_json_bytes(dataset)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let io_err = |source: std::io::Error| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&bytes).map_err(io_err)?;
    // Temp files are created owner-only.
    if let Some(perms) = target_permissions(path).map_err(io_err)? {
        tmp.as_file().set_permissions(perms).map_err(io_err)?;
    }
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    tracing::debug!(path = %path.display(), records = dataset.len(), "wrote dataset");
    Ok(())
}

fn target_permissions(path: &Path) -> std::io::Result<Option<std::fs::Permissions>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.permissions())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(default_permissions()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<std::fs::Permissions> {
    None
}

/// The dataset file does not exist yet.
#[derive(Debug)]
pub struct MissingDatasetError {
    pub path: PathBuf,
}

impl std::fmt::Display for MissingDatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dataset {} not found; run `flmetrics build` first",
            self.path.display()
        )
    }
}

impl std::error::Error for MissingDatasetError {}

/// Two records share a run_id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionError {
    pub run_id: String,
}

impl std::fmt::Display for CollisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run_id collision: {} is shared by more than one record",
            self.run_id
        )
    }
}

impl std::error::Error for CollisionError {}

/// Errors from reading or writing the dataset file.
#[derive(Debug)]
pub enum DatasetError {
    Missing(MissingDatasetError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Serialize {
        source: serde_json::Error,
    },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Missing(e) => write!(f, "{e}"),
            DatasetError::Io { path, source } => {
                write!(f, "failed to access dataset {}: {source}", path.display())
            }
            DatasetError::Parse { path, source } => {
                write!(f, "failed to parse dataset {}: {source}", path.display())
            }
            DatasetError::Serialize { source } => {
                write!(f, "failed to serialize dataset: {source}")
            }
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::Missing(e) => Some(e),
            DatasetError::Io { source, .. } => Some(source),
            DatasetError::Parse { source, .. } => Some(source),
            DatasetError::Serialize { source } => Some(source),
        }
    }
}

impl From<MissingDatasetError> for DatasetError {
    fn from(e: MissingDatasetError) -> Self {
        DatasetError::Missing(e)
    }
}

#[cfg(test)]
pub(crate) fn record(run_id: &str, wer: f64, bleu: f64) -> Record {
    let mut metrics = BTreeMap::new();
    metrics.insert(WER.to_string(), wer);
    metrics.insert(BLEU.to_string(), bleu);
    Record::new(RunId::from(run_id), metrics)
}
