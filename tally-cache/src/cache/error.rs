//! Cache error types.

use tally_core::TallyError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The backing collection fetch failed; the caller cannot tell whether
    /// the record exists.
    #[error("Fetch of {scope} failed: {source}")]
    Fetch {
        scope: String,
        #[source]
        source: TallyError,
    },
}

impl CacheError {
    pub fn source_error(&self) -> &TallyError {
        match self {
            CacheError::Fetch { source, .. } => source,
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
