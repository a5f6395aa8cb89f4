//! `SQLite` implementation of the `ProfileRepository` trait.

use async_trait::async_trait;
use sqlx::SqlitePool;

use revid_core::domain::{NewProfile, Profile};
use revid_core::{ProfileRepository, RepositoryError};

use super::row_mappers::{row_to_profile, PROFILE_COLUMNS};

fn storage(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

/// `SQLite` implementation of the `ProfileRepository` trait.
pub struct SqliteProfileRepository {
    pool: SqlitePool,
}

impl SqliteProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for SqliteProfileRepository {
    async fn list(&self) -> Result<Vec<Profile>, RepositoryError> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY name");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter().map(row_to_profile).collect()
    }

    async fn get(&self, id: i64) -> Result<Profile, RepositoryError> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| RepositoryError::NotFound(format!("Profile with ID {id}")))?;

        row_to_profile(&row)
    }

    async fn insert(&self, profile: &NewProfile) -> Result<Profile, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO profiles (name, description, codec, encode_type, encode_value,
                preset, tune, extra_args, keep_original_main_audio)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&profile.name)
        .bind(&profile.description)
        .bind(profile.codec.as_str())
        .bind(profile.encode_type.as_str())
        .bind(profile.encode_value)
        .bind(&profile.preset)
        .bind(&profile.tune)
        .bind(&profile.extra_args)
        .bind(i64::from(profile.keep_original_main_audio))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::AlreadyExists(format!("Profile named '{}'", profile.name))
            }
            other => storage(other),
        })?;

        self.get(result.last_insert_rowid()).await
    }
}
