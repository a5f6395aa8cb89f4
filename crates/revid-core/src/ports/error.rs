//! Repository error type shared by all persistence ports.

use thiserror::Error;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The underlying store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A value could not be (de)serialized for storage.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
