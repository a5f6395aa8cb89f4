//! `SQLite` implementation of the `FileRepository` trait.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;

use revid_core::domain::{FinalizedFile, MediaFile, NewMediaFile};
use revid_core::{FileRepository, RepositoryError};

use super::row_mappers::{row_to_file, FILE_COLUMNS};

fn storage(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

/// `SQLite` implementation of the `FileRepository` trait.
pub struct SqliteFileRepository {
    pool: SqlitePool,
}

impl SqliteFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for SqliteFileRepository {
    async fn get(&self, id: i64) -> Result<MediaFile, RepositoryError> {
        let query = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| RepositoryError::NotFound(format!("File with ID {id}")))?;

        row_to_file(&row)
    }

    async fn get_or_create(&self, file: &NewMediaFile) -> Result<MediaFile, RepositoryError> {
        let directory = file.directory.to_string_lossy();
        let probe_info = file
            .probe_info
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        // DO NOTHING keeps the original record's probed stats when the same
        // (name, directory) pair is registered twice.
        sqlx::query(
            r#"INSERT INTO files (name, directory, size, duration, frame_rate, frames, probe_info)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(name, directory) DO NOTHING"#,
        )
        .bind(&file.name)
        .bind(directory.as_ref())
        .bind(file.size)
        .bind(file.duration)
        .bind(file.frame_rate)
        .bind(file.frames)
        .bind(&probe_info)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        let query = format!("SELECT {FILE_COLUMNS} FROM files WHERE name = ? AND directory = ?");
        let row = sqlx::query(&query)
            .bind(&file.name)
            .bind(directory.as_ref())
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        row_to_file(&row)
    }

    async fn finalize(&self, id: i64, probed: &FinalizedFile) -> Result<(), RepositoryError> {
        let probe_info = probed
            .probe_info
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE files SET size = ?, duration = ?, frame_rate = ?, frames = ?, \
             probe_info = COALESCE(?, probe_info) WHERE id = ?",
        )
        .bind(probed.size)
        .bind(probed.duration)
        .bind(probed.frame_rate)
        .bind(probed.frames)
        .bind(&probe_info)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("File with ID {id}")));
        }
        Ok(())
    }

    async fn list_under(&self, directory: &Path) -> Result<Vec<MediaFile>, RepositoryError> {
        let prefix = directory.to_string_lossy();
        let query = format!(
            "SELECT {FILE_COLUMNS} FROM files \
             WHERE directory = ?1 OR directory LIKE ?1 || '/%' ORDER BY name"
        );

        let rows = sqlx::query(&query)
            .bind(prefix.as_ref())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter().map(row_to_file).collect()
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("File with ID {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    fn new_file(name: &str, directory: &str) -> NewMediaFile {
        NewMediaFile {
            name: name.into(),
            directory: directory.into(),
            size: 1_000_000,
            duration: 120.5,
            frame_rate: 23.976,
            frames: 2889,
            probe_info: None,
        }
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteFileRepository::new(pool);

        let first = repo.get_or_create(&new_file("a.mkv", "/in")).await.unwrap();
        let mut again = new_file("a.mkv", "/in");
        again.size = 42; // different stats must not overwrite
        let second = repo.get_or_create(&again).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.size, 1_000_000);
    }

    #[tokio::test]
    async fn same_name_in_different_directory_is_a_new_file() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteFileRepository::new(pool);

        let a = repo.get_or_create(&new_file("a.mkv", "/in")).await.unwrap();
        let b = repo
            .get_or_create(&new_file("a.mkv", "/out/x264"))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn finalize_updates_probed_stats() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteFileRepository::new(pool);

        let file = repo
            .get_or_create(&NewMediaFile::placeholder("enc.mkv", "/out/x264"))
            .await
            .unwrap();
        assert!(file.is_in_flight());

        repo.finalize(
            file.id,
            &FinalizedFile {
                size: 500_000,
                duration: 120.5,
                frame_rate: 23.976,
                frames: 2889,
                probe_info: Some(serde_json::json!({"format": {"size": "500000"}})),
            },
        )
        .await
        .unwrap();

        let reloaded = repo.get(file.id).await.unwrap();
        assert!(!reloaded.is_in_flight());
        assert_eq!(reloaded.size, 500_000);
        assert!(reloaded.probe_info.is_some());
    }

    #[tokio::test]
    async fn list_under_matches_subdirectories() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteFileRepository::new(pool);

        repo.get_or_create(&new_file("a.mkv", "/out")).await.unwrap();
        repo.get_or_create(&new_file("b.mkv", "/out/x264"))
            .await
            .unwrap();
        repo.get_or_create(&new_file("c.mkv", "/in")).await.unwrap();

        let under_out = repo.list_under(Path::new("/out")).await.unwrap();
        assert_eq!(under_out.len(), 2);
    }

    #[tokio::test]
    async fn delete_missing_file_is_not_found() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteFileRepository::new(pool);

        let err = repo.delete(999).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
