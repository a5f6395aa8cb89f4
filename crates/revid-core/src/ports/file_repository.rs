//! File repository trait definition.

use async_trait::async_trait;
use std::path::Path;

use super::RepositoryError;
use crate::domain::{FinalizedFile, MediaFile, NewMediaFile};

/// Repository for registered media files.
///
/// Files are identified by their `(name, directory)` pair; `get_or_create`
/// is the only insert path, which makes repeated ingest scans idempotent.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Get a file by its database ID.
    ///
    /// Returns `Err(RepositoryError::NotFound)` if the file doesn't exist.
    async fn get(&self, id: i64) -> Result<MediaFile, RepositoryError>;

    /// Get the file with this name and directory, creating it if absent.
    async fn get_or_create(&self, file: &NewMediaFile) -> Result<MediaFile, RepositoryError>;

    /// Overwrite a file's probed attributes after its bytes are fully on
    /// disk (artifact upload finalization).
    async fn finalize(&self, id: i64, probed: &FinalizedFile) -> Result<(), RepositoryError>;

    /// List files registered under a directory (prefix match).
    async fn list_under(&self, directory: &Path) -> Result<Vec<MediaFile>, RepositoryError>;

    /// Delete a file record. Tasks referencing it cascade.
    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;
}
