//! `SQLite` repository implementations for the revid coordinator.
//!
//! The coordinator is the sole writer to the record store; workers only
//! ever see its HTTP surface. This crate implements the repository ports
//! defined in `revid-core` on top of `sqlx`.

mod factory;
mod repositories;
mod setup;

pub use factory::build_repos;
pub use repositories::{
    SqliteEncodeTaskRepository, SqliteFileRepository, SqliteMetricTaskRepository,
    SqliteProfileRepository,
};
pub use setup::setup_database;

#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
