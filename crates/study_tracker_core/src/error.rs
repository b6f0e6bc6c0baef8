//! crates/study_tracker_core/src/error.rs
//!
//! The error taxonomy shared by every core operation.

use crate::ports::StoreError;

/// Errors surfaced by the hierarchy and progress operations.
///
/// `AccessDenied` and `NotFound` are distinct here so callers can log them
/// apart; the web layer merges them into one user-visible message so an
/// unauthorized probe cannot learn whether an id exists.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A required field was missing or malformed. No state was mutated.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The entity exists but is not owned by the requesting user.
    #[error("Access denied")]
    AccessDenied,

    /// The entity id did not resolve.
    #[error("Not found")]
    NotFound,

    /// The store failed mid-operation; any transaction was rolled back.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<StoreError> for TrackerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => TrackerError::NotFound,
            StoreError::Conflict(msg) => TrackerError::Validation(msg),
            StoreError::Unexpected(msg) => TrackerError::Persistence(msg),
        }
    }
}

/// A convenience type alias for `Result<T, TrackerError>`.
pub type TrackerResult<T> = Result<T, TrackerError>;
