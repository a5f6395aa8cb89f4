//! Port definitions: the traits adapters implement.
//!
//! Repository traits are the only mutation path to persistent state. No
//! `sqlx` types appear in any signature here.

mod encode_task_repository;
mod error;
mod file_repository;
mod metric_task_repository;
mod profile_repository;
mod repos;

pub use encode_task_repository::EncodeTaskRepository;
pub use error::RepositoryError;
pub use file_repository::FileRepository;
pub use metric_task_repository::MetricTaskRepository;
pub use profile_repository::ProfileRepository;
pub use repos::Repos;
