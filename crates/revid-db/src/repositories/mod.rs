//! Repository implementations.

mod row_mappers;
mod sqlite_encode_task_repository;
mod sqlite_file_repository;
mod sqlite_metric_task_repository;
mod sqlite_profile_repository;

pub use sqlite_encode_task_repository::SqliteEncodeTaskRepository;
pub use sqlite_file_repository::SqliteFileRepository;
pub use sqlite_metric_task_repository::SqliteMetricTaskRepository;
pub use sqlite_profile_repository::SqliteProfileRepository;
