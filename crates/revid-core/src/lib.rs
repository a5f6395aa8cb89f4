//! Core domain types and port definitions for the revid pipeline.
//!
//! Everything in this crate is infrastructure-free: no SQL, no AMQP, no HTTP.
//! Adapters (`revid-db`, `revid-broker`, `revid-axum`, `revid-worker`) depend
//! on the traits defined under [`ports`] and the types under [`domain`].

pub mod domain;
pub mod pooling;
pub mod ports;
pub mod queue;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    Codec, EncodeMode, EncodeTask, EncodeTaskDetail, FinalizedFile, FrameScore, MediaFile,
    MetricKind, MetricTask, MetricTaskDetail, NewEncodeTask, NewFrameScore, NewMediaFile,
    NewMetricTask, NewProfile, PooledMetric, PooledSummary, Profile, ProgressUpdate, ReportFrame,
    TaskStatus, VmafReport,
};
pub use ports::{
    EncodeTaskRepository, FileRepository, MetricTaskRepository, ProfileRepository, Repos,
    RepositoryError,
};
pub use queue::{Envelope, QueueError, TaskQueue};
pub use settings::{Settings, SettingsError};
