//! Error types for the triage engine.
//!
//! Every variant here is recoverable and returned to the immediate caller;
//! nothing in this crate escalates to a process-level failure, and no
//! operation is retried internally. Callers are expected to surface the
//! specific kind to the user, since the cause (stale data vs. resource
//! conflict) changes the next clinical action.

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("patient is no longer in the queue")]
    AlreadyAssigned,
    #[error("bed is already occupied and must be freed before reassignment")]
    BedAlreadyOccupied,
    #[error("occupying a bed requires a patient id and patient name")]
    MissingAssignmentData,
    #[error("no bed with that number")]
    BedNotFound,
    #[error("caller is not authorised for clinical operations")]
    Unauthorized,
    #[error("failed to read state file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write state file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize state: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize state: {0}")]
    Deserialization(serde_json::Error),
    #[error("invalid symptom catalogue: {0}")]
    CatalogLoad(String),
    #[error("failed to parse symptom catalogue: {0}")]
    CatalogParse(serde_yaml::Error),
}

pub type CoreResult<T> = std::result::Result<T, TriageError>;
