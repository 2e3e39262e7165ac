/// Run-id shortening: truncate the hash suffix of every run_id for display.
///
/// Lossy. The result is checked for uniqueness and a collision fails the whole
/// call; the caller decides whether to persist the returned dataset.
use crate::config::{self, ValidationError};
use crate::dataset::{CollisionError, Dataset, Record, RunId};

/// Return a copy of `dataset` with every hash suffix cut to `hash_length` characters.
///
/// Suffixes already at or below the target length, and ids without an
/// underscore, pass through unchanged. All metric fields are kept verbatim.
pub fn shorten_run_ids(dataset: &Dataset, hash_length: usize) -> Result<Dataset, ShortenError> {
    config::validate_hash_length(hash_length).map_err(ShortenError::Validation)?;

    let records: Vec<Record> = dataset
        .iter()
        .map(|r| Record::new(shorten_run_id(&r.run_id, hash_length), r.metrics.clone()))
        .collect();
    let shortened = Dataset::new(records);

    shortened
        .ensure_unique()
        .map_err(ShortenError::Collision)?;
    Ok(shortened)
}

/// Shorten a single id. Hash suffixes are hex, so byte slicing is safe; a
/// non-ASCII suffix is left alone.
pub fn shorten_run_id(run_id: &RunId, hash_length: usize) -> RunId {
    match run_id.hash() {
        Some(hash) if hash.len() > hash_length && hash.is_ascii() => {
            RunId::new(run_id.model_name(), &hash[..hash_length])
        }
        Some(_) => run_id.clone(),
        None => {
            tracing::debug!(%run_id, "run_id has no hash suffix, leaving unchanged");
            run_id.clone()
        }
    }
}

/// Errors from shortening run ids.
#[derive(Debug)]
pub enum ShortenError {
    Validation(ValidationError),
    Collision(CollisionError),
}

impl std::fmt::Display for ShortenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShortenError::Validation(e) => write!(f, "{e}"),
            ShortenError::Collision(e) => {
                write!(f, "{e} after shortening; use a longer hash length")
            }
        }
    }
}

impl std::error::Error for ShortenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShortenError::Validation(e) => Some(e),
            ShortenError::Collision(e) => Some(e),
        }
    }
}
