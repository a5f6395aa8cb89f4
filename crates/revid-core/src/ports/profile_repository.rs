//! Profile repository trait definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{NewProfile, Profile};

/// Repository for encode profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// List all profiles.
    async fn list(&self) -> Result<Vec<Profile>, RepositoryError>;

    /// Get a profile by its database ID.
    ///
    /// Returns `Err(RepositoryError::NotFound)` if the profile doesn't exist.
    async fn get(&self, id: i64) -> Result<Profile, RepositoryError>;

    /// Insert a new profile and return it with its assigned ID.
    async fn insert(&self, profile: &NewProfile) -> Result<Profile, RepositoryError>;
}
