use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Inclusive bounds for the shortened run_id hash suffix.
pub const MIN_HASH_LENGTH: usize = 6;
pub const MAX_HASH_LENGTH: usize = 8;

/// Top-level configuration loaded from flmetrics.toml.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct MetricsConfig {
    pub paths: PathsConfig,
    pub shorten: ShortenConfig,
    pub serve: ServeConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding one raw metric file per run.
    pub raw_dir: PathBuf,
    /// The persisted dataset file.
    pub dataset: PathBuf,
    /// File extension (without the dot) used to discover raw files.
    pub extension: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShortenConfig {
    pub hash_length: usize,
}

/// Read only by `flmetrics serve`; still parsed when that feature is off.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
#[cfg_attr(not(feature = "serve"), allow(dead_code))]
pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
}

// --- Default implementations ---

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            dataset: PathBuf::from("data/processed/processed_metrics.json"),
            extension: "csv".to_string(),
        }
    }
}

impl Default for ShortenConfig {
    fn default() -> Self {
        Self {
            hash_length: MIN_HASH_LENGTH,
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

impl MetricsConfig {
    /// Load config from `path`. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range settings before anything touches the dataset.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_hash_length(self.shorten.hash_length)?;
        if self.paths.extension.trim_start_matches('.').is_empty() {
            return Err(ValidationError::new(
                "paths.extension",
                &self.paths.extension,
                "a non-empty file extension",
            ));
        }
        Ok(())
    }
}

pub fn validate_hash_length(hash_length: usize) -> Result<(), ValidationError> {
    if (MIN_HASH_LENGTH..=MAX_HASH_LENGTH).contains(&hash_length) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "hash_length",
            hash_length,
            &format!("a value between {MIN_HASH_LENGTH} and {MAX_HASH_LENGTH}"),
        ))
    }
}

/// A configuration parameter is out of its accepted range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub parameter: String,
    pub value: String,
    pub expected: String,
}

impl ValidationError {
    pub fn new(parameter: &str, value: impl std::fmt::Display, expected: &str) -> Self {
        Self {
            parameter: parameter.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid {} {:?}: expected {}",
            self.parameter, self.value, self.expected
        )
    }
}

impl std::error::Error for ValidationError {}

/// Errors from loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(ValidationError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            ConfigError::Invalid(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(e) => Some(e),
        }
    }
}

impl From<ValidationError> for ConfigError {
    fn from(e: ValidationError) -> Self {
        ConfigError::Invalid(e)
    }
}
