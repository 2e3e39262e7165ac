//! Dataset build: discover raw metric files, extract one Record per file,
//! check run_id uniqueness, and persist the result.
//!
//! Each stage is a separate function over typed values so it can be tested on
//! its own. Any failure aborts the build before the dataset file is touched.

use crate::dataset::{self, CollisionError, Dataset, DatasetError, Record};
use crate::extract::{self, ExtractError};
use std::path::{Path, PathBuf};

/// Outcome of a completed build.
#[derive(Debug)]
pub struct BuildReport {
    /// Raw files that were extracted, in dataset order.
    pub sources: Vec<PathBuf>,
    pub dataset: Dataset,
    pub output: PathBuf,
}

/// Find raw metric files in `raw_dir` with the given extension, sorted by file name.
pub fn discover(raw_dir: &Path, extension: &str) -> Result<Vec<PathBuf>, BuildError> {
    if !raw_dir.is_dir() {
        return Err(BuildError::Discover {
            dir: raw_dir.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "raw metrics directory does not exist",
            ),
        });
    }

    // The directory part must match literally, only the file name is a wildcard.
    let dir = raw_dir.to_string_lossy();
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(dir.trim_end_matches('/')),
        glob::Pattern::escape(extension.trim_start_matches('.'))
    );

    let entries = glob::glob(&pattern).map_err(|e| BuildError::Discover {
        dir: raw_dir.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| BuildError::Discover {
            dir: raw_dir.to_path_buf(),
            source: e.into(),
        })?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    tracing::debug!(dir = %raw_dir.display(), files = paths.len(), "discovered raw metric files");
    Ok(paths)
}

/// Extract every file. The first failure aborts the whole stage.
pub fn extract_all(paths: &[PathBuf]) -> Result<Vec<Record>, BuildError> {
    paths
        .iter()
        .map(|p| extract::extract_record(p).map_err(BuildError::Extract))
        .collect()
}

/// Wrap extracted records as a Dataset once run_ids are known to be unique.
pub fn validate(records: Vec<Record>) -> Result<Dataset, BuildError> {
    let dataset = Dataset::new(records);
    dataset.ensure_unique().map_err(BuildError::Collision)?;
    Ok(dataset)
}

/// Run all stages and overwrite `output` with the new dataset.
pub fn build_dataset(
    raw_dir: &Path,
    extension: &str,
    output: &Path,
) -> Result<BuildReport, BuildError> {
    let sources = discover(raw_dir, extension)?;
    if sources.is_empty() {
        tracing::warn!(
            dir = %raw_dir.display(),
            extension,
            "no raw metric files found, writing an empty dataset"
        );
    }

    let records = extract_all(&sources)?;
    let dataset = validate(records)?;
    dataset::save_dataset(&dataset, output).map_err(BuildError::Persist)?;

    tracing::info!(
        records = dataset.len(),
        output = %output.display(),
        "dataset built"
    );
    Ok(BuildReport {
        sources,
        dataset,
        output: output.to_path_buf(),
    })
}

/// Errors that abort a dataset build.
#[derive(Debug)]
pub enum BuildError {
    /// The raw directory could not be listed.
    Discover {
        dir: PathBuf,
        source: std::io::Error,
    },
    /// A raw file could not be read or parsed.
    Extract(ExtractError),
    /// Two files produced the same run_id.
    Collision(CollisionError),
    /// Writing the dataset failed.
    Persist(DatasetError),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Discover { dir, source } => {
                write!(f, "failed to list raw metrics in {}: {source}", dir.display())
            }
            BuildError::Extract(e) => write!(f, "{e}"),
            BuildError::Collision(e) => write!(f, "{e}"),
            BuildError::Persist(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Discover { source, .. } => Some(source),
            BuildError::Extract(e) => Some(e),
            BuildError::Collision(e) => Some(e),
            BuildError::Persist(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{load_dataset, record, RunId};
    use crate::extract::{filename_hash, MalformedReason};
    use tempfile::TempDir;

    fn raw_dir_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    fn scenario_dir() -> TempDir {
        raw_dir_with(&[
            ("eager-haze.csv", "metric,value\nwer,0.21\nbleu,31.5\n"),
            ("smart-smoke.csv", "metric,value\nwer,0.18\nbleu,29.0\n"),
        ])
    }

    #[test]
    fn discover_filters_by_extension_and_sorts() {
        let dir = raw_dir_with(&[
            ("b.csv", "metric,value\n"),
            ("a.csv", "metric,value\n"),
            ("notes.txt", "ignore me"),
            ("c.csv.bak", "metric,value\n"),
        ]);
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let names: Vec<_> = discover(dir.path(), "csv")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn discover_accepts_leading_dot_in_extension() {
        let dir = raw_dir_with(&[("a.tsv", "metric,value\n")]);
        assert_eq!(discover(dir.path(), ".tsv").unwrap().len(), 1);
    }

    #[test]
    fn discover_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let err = discover(&dir.path().join("absent"), "csv").unwrap_err();
        assert!(matches!(err, BuildError::Discover { .. }));
    }

    #[test]
    fn build_scenario_produces_two_unique_records() {
        let raw = scenario_dir();
        let out = TempDir::new().unwrap();
        let output = out.path().join("processed/processed_metrics.json");

        let report = build_dataset(raw.path(), "csv", &output).unwrap();
        assert_eq!(report.dataset.len(), 2);
        assert_eq!(report.sources.len(), 2);

        let loaded = load_dataset(&output).unwrap();
        assert_eq!(loaded, report.dataset);
        let ids: Vec<&str> = loaded.iter().map(|r| r.run_id.as_str()).collect();
        assert!(ids[0].starts_with("eager-haze_"));
        assert!(ids[1].starts_with("smart-smoke_"));
        assert_ne!(ids[0], ids[1]);
        assert!(loaded.ensure_unique().is_ok());
    }

    #[test]
    fn build_is_byte_identical_across_runs() {
        let raw = scenario_dir();
        let out = TempDir::new().unwrap();
        let output = out.path().join("metrics.json");

        build_dataset(raw.path(), "csv", &output).unwrap();
        let first = std::fs::read(&output).unwrap();
        build_dataset(raw.path(), "csv", &output).unwrap();
        let second = std::fs::read(&output).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_file_aborts_without_writing() {
        let raw = raw_dir_with(&[
            ("good.csv", "metric,value\nwer,0.2\nbleu,30\n"),
            ("bad.csv", "metric,value\nwer,oops\n"),
        ]);
        let out = TempDir::new().unwrap();
        let output = out.path().join("metrics.json");

        let err = build_dataset(raw.path(), "csv", &output).unwrap_err();
        match &err {
            BuildError::Extract(ExtractError::Malformed(e)) => {
                assert!(e.path.ends_with("bad.csv"));
                assert!(matches!(e.reason, MalformedReason::InvalidValue { .. }));
            }
            other => panic!("expected malformed record, got {other}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn run_id_metric_row_aborts_without_writing() {
        let raw = raw_dir_with(&[("m.csv", "metric,value\nwer,0.2\nbleu,30\nrun_id,5\n")]);
        let out = TempDir::new().unwrap();
        let output = out.path().join("metrics.json");

        match build_dataset(raw.path(), "csv", &output).unwrap_err() {
            BuildError::Extract(ExtractError::Malformed(e)) => {
                assert!(matches!(e.reason, MalformedReason::ReservedMetricName { .. }));
            }
            other => panic!("expected malformed record, got {other}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn record_without_wer_aborts_without_writing() {
        let raw = raw_dir_with(&[
            ("good.csv", "metric,value\nwer,0.2\nbleu,30\n"),
            ("m.csv", "metric,value\nbleu,30\n"),
        ]);
        let out = TempDir::new().unwrap();
        let output = out.path().join("metrics.json");

        assert!(build_dataset(raw.path(), "csv", &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn failed_rebuild_keeps_previous_dataset() {
        let raw = scenario_dir();
        let out = TempDir::new().unwrap();
        let output = out.path().join("metrics.json");
        build_dataset(raw.path(), "csv", &output).unwrap();
        let before = std::fs::read(&output).unwrap();

        std::fs::write(raw.path().join("broken.csv"), "name,score\nwer,1\n").unwrap();
        assert!(build_dataset(raw.path(), "csv", &output).is_err());
        assert_eq!(std::fs::read(&output).unwrap(), before);
    }

    #[test]
    fn empty_dir_writes_empty_dataset() {
        let raw = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let output = out.path().join("metrics.json");
        let report = build_dataset(raw.path(), "csv", &output).unwrap();
        assert!(report.dataset.is_empty());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "[]\n");
    }

    #[test]
    fn validate_rejects_duplicate_run_ids() {
        let id = format!("run_{}", filename_hash("run.csv"));
        let records = vec![record(&id, 0.1, 10.0), record(&id, 0.2, 20.0)];
        match validate(records).unwrap_err() {
            BuildError::Collision(e) => assert_eq!(e.run_id, id),
            other => panic!("expected collision, got {other}"),
        }
    }

    #[test]
    fn extract_all_preserves_input_order() {
        let raw = scenario_dir();
        let paths = vec![
            raw.path().join("smart-smoke.csv"),
            raw.path().join("eager-haze.csv"),
        ];
        let records = extract_all(&paths).unwrap();
        assert_eq!(records[0].run_id.model_name(), "smart-smoke");
        assert_eq!(records[1].run_id.model_name(), "eager-haze");
        assert_eq!(
            records[1].run_id,
            RunId::new("eager-haze", &filename_hash("eager-haze.csv"))
        );
    }
}
