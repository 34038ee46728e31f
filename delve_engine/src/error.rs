//! Error type shared by every store operation.
//!
//! Callers only need to tell a handful of situations apart, so storage failures of
//! any flavour (bad SQL, constraint violations, I/O) collapse into `StorageFault`.

use delve_data::{ParseDirectionError, RoomId, ValidationError};
use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Reasons a store operation can fail.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no world store is open")]
    NotInitialized,
    #[error("bad value: {0}")]
    BadValue(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cannot delete room {0}: it is the last room in the world")]
    LastRoom(RoomId),
    #[error("storage fault: {0}")]
    StorageFault(String),
}

impl StoreError {
    /// Fold draft validation problems into one `BadValue`.
    pub fn from_validation(errors: &[ValidationError]) -> Self {
        let joined = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        StoreError::BadValue(joined)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::StorageFault(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::StorageFault(err.to_string())
    }
}

impl From<ParseDirectionError> for StoreError {
    fn from(err: ParseDirectionError) -> Self {
        StoreError::BadValue(err.to_string())
    }
}
