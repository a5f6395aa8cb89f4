//! Composition utilities for wiring `SQLite` repositories.
//!
//! Construction only; no domain logic lives here.

use sqlx::SqlitePool;
use std::sync::Arc;

use revid_core::Repos;

use crate::repositories::{
    SqliteEncodeTaskRepository, SqliteFileRepository, SqliteMetricTaskRepository,
    SqliteProfileRepository,
};

/// Build all `SQLite` repositories from a pool.
///
/// This is the recommended way for adapters to obtain repositories; the
/// returned [`Repos`] holds trait-object-wrapped handles only.
pub fn build_repos(pool: SqlitePool) -> Repos {
    Repos::new(
        Arc::new(SqliteFileRepository::new(pool.clone())),
        Arc::new(SqliteProfileRepository::new(pool.clone())),
        Arc::new(SqliteEncodeTaskRepository::new(pool.clone())),
        Arc::new(SqliteMetricTaskRepository::new(pool)),
    )
}
