//! Error taxonomy shared across the enrollment store, attendance ledger, and
//! sync layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RollcallError {
    /// Missing or malformed required fields on input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A student or record that the operation requires does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A natural key (roll number) is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A probe or reference vector does not match the configured embedding
    /// dimensionality.
    #[error("invalid descriptor: expected {expected} dimensions, got {got}")]
    InvalidDescriptor { expected: usize, got: usize },

    /// A collaborator (SMTP relay, embedding model) failed. Reported
    /// per-item in batch results, never fatal to a batch.
    #[error("external service failure: {0}")]
    ExternalService(String),

    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    #[error(transparent)]
    Connection(#[from] diesel::ConnectionError),

    #[error("descriptor encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RollcallError>;
