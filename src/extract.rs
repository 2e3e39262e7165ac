/// Raw metric file extraction: parse one `metric,value` table into a Record
/// and derive its run_id from the file name.
use crate::dataset::{Record, RunId, BLEU, RUN_ID, WER};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const METRIC_COLUMN: &str = "metric";
const VALUE_COLUMN: &str = "value";

/// Hex-encoded SHA-256 of the file's base name.
pub fn filename_hash(file_name: &str) -> String {
    format!("{:x}", Sha256::digest(file_name.as_bytes()))
}

/// `<stem>_<sha256(file name)>`. Depends only on the base name, never on content,
/// so a file keeps its run_id across rebuilds.
pub fn derive_run_id(path: &Path) -> Result<RunId, MalformedRecordError> {
    let malformed = |reason| MalformedRecordError {
        path: path.to_path_buf(),
        reason,
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| malformed(MalformedReason::NoFileName))?
        .to_str()
        .ok_or_else(|| malformed(MalformedReason::NonUtf8Name))?;
    let model_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    Ok(RunId::new(model_name, &filename_hash(file_name)))
}

/// Parse one raw metric file into a Record.
///
/// Rows are located by the `metric` and `value` header names; extra columns are
/// ignored. If a metric name repeats, the last row wins and a warning is logged.
/// The result always carries `wer` (>= 0) and `bleu` (0 to 100).
pub fn extract_record(path: &Path) -> Result<Record, ExtractError> {
    let run_id = derive_run_id(path)?;
    let file = std::fs::File::open(path).map_err(|e| ExtractError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let metrics = parse_metrics(path, file)?;
    tracing::debug!(file = %path.display(), %run_id, metrics = metrics.len(), "extracted record");
    Ok(Record::new(run_id, metrics))
}

fn parse_metrics(
    path: &Path,
    input: impl std::io::Read,
) -> Result<BTreeMap<String, f64>, MalformedRecordError> {
    let malformed = |reason| MalformedRecordError {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| malformed(MalformedReason::Csv(e)))?
        .clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| malformed(MalformedReason::MissingColumn(name)))
    };
    let metric_idx = column(METRIC_COLUMN)?;
    let value_idx = column(VALUE_COLUMN)?;

    let mut metrics = BTreeMap::new();
    for row in reader.records() {
        let row = row.map_err(|e| malformed(MalformedReason::Csv(e)))?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let metric = row.get(metric_idx).unwrap_or_default();
        let raw = row.get(value_idx).unwrap_or_default();

        if metric.is_empty() {
            return Err(malformed(MalformedReason::EmptyMetricName { line }));
        }
        // Metrics are flattened next to `run_id` in the stored object.
        if metric == RUN_ID {
            return Err(malformed(MalformedReason::ReservedMetricName { line }));
        }
        let value: f64 = raw.parse().map_err(|_| {
            malformed(MalformedReason::InvalidValue {
                line,
                metric: metric.to_string(),
                value: raw.to_string(),
            })
        })?;
        if !value.is_finite() {
            return Err(malformed(MalformedReason::InvalidValue {
                line,
                metric: metric.to_string(),
                value: raw.to_string(),
            }));
        }

        if metrics.insert(metric.to_string(), value).is_some() {
            // Known limitation: duplicate metric rows are last-write-wins.
            tracing::warn!(
                file = %path.display(),
                metric,
                line,
                "duplicate metric row, keeping the last value"
            );
        }
    }

    let out_of_range = |metric, value| malformed(MalformedReason::OutOfRange { metric, value });
    let wer = *metrics
        .get(WER)
        .ok_or_else(|| malformed(MalformedReason::MissingMetric(WER)))?;
    if wer < 0.0 {
        return Err(out_of_range(WER, wer));
    }
    let bleu = *metrics
        .get(BLEU)
        .ok_or_else(|| malformed(MalformedReason::MissingMetric(BLEU)))?;
    if !(0.0..=100.0).contains(&bleu) {
        return Err(out_of_range(BLEU, bleu));
    }

    Ok(metrics)
}

/// Why a raw metric file could not be turned into a Record.
#[derive(Debug)]
pub enum MalformedReason {
    MissingColumn(&'static str),
    InvalidValue {
        line: u64,
        metric: String,
        value: String,
    },
    EmptyMetricName {
        line: u64,
    },
    ReservedMetricName {
        line: u64,
    },
    MissingMetric(&'static str),
    OutOfRange {
        metric: &'static str,
        value: f64,
    },
    NoFileName,
    NonUtf8Name,
    Csv(csv::Error),
}

/// A raw metric file is missing required columns or rows, or holds an unusable value.
#[derive(Debug)]
pub struct MalformedRecordError {
    pub path: PathBuf,
    pub reason: MalformedReason,
}

impl std::fmt::Display for MalformedRecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self.path.display();
        match &self.reason {
            MalformedReason::MissingColumn(col) => {
                write!(f, "malformed metric file {path}: missing `{col}` column")
            }
            MalformedReason::InvalidValue {
                line,
                metric,
                value,
            } => write!(
                f,
                "malformed metric file {path}: line {line}: value {value:?} for metric `{metric}` is not a finite number"
            ),
            MalformedReason::EmptyMetricName { line } => {
                write!(f, "malformed metric file {path}: line {line}: empty metric name")
            }
            MalformedReason::ReservedMetricName { line } => write!(
                f,
                "malformed metric file {path}: line {line}: `{RUN_ID}` cannot be used as a metric name"
            ),
            MalformedReason::MissingMetric(metric) => {
                write!(f, "malformed metric file {path}: no `{metric}` row")
            }
            MalformedReason::OutOfRange { metric, value } => write!(
                f,
                "malformed metric file {path}: `{metric}` value {value} is out of range"
            ),
            MalformedReason::NoFileName => {
                write!(f, "malformed metric file {path}: path has no file name")
            }
            MalformedReason::NonUtf8Name => {
                write!(f, "malformed metric file {path}: file name is not valid UTF-8")
            }
            MalformedReason::Csv(e) => write!(f, "malformed metric file {path}: {e}"),
        }
    }
}

impl std::error::Error for MalformedRecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.reason {
            MalformedReason::Csv(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors from extracting a single file.
#[derive(Debug)]
pub enum ExtractError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Malformed(MalformedRecordError),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io { path, source } => {
                write!(f, "failed to read metric file {}: {source}", path.display())
            }
            ExtractError::Malformed(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Io { source, .. } => Some(source),
            ExtractError::Malformed(e) => Some(e),
        }
    }
}

impl From<MalformedRecordError> for ExtractError {
    fn from(e: MalformedRecordError) -> Self {
        ExtractError::Malformed(e)
    }
}
