//! Aggregate of all repository handles.

use std::sync::Arc;

use super::{
    EncodeTaskRepository, FileRepository, MetricTaskRepository, ProfileRepository,
};

/// All repositories, wired once at composition time and passed to handlers
/// and services explicitly. There is no global store handle.
#[derive(Clone)]
pub struct Repos {
    pub files: Arc<dyn FileRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub encode_tasks: Arc<dyn EncodeTaskRepository>,
    pub metric_tasks: Arc<dyn MetricTaskRepository>,
}

impl Repos {
    pub fn new(
        files: Arc<dyn FileRepository>,
        profiles: Arc<dyn ProfileRepository>,
        encode_tasks: Arc<dyn EncodeTaskRepository>,
        metric_tasks: Arc<dyn MetricTaskRepository>,
    ) -> Self {
        Self {
            files,
            profiles,
            encode_tasks,
            metric_tasks,
        }
    }
}
