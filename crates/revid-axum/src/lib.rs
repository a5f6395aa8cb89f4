//! Coordinator HTTP surface.
//!
//! Every worker state transition goes through these handlers: task detail
//! and progress, source-file streaming, artifact/report ingestion with
//! size validation and quarantine, plus the listing and ingest endpoints
//! the UI/CLI drive.

pub mod aggregate;
pub mod bootstrap;
pub mod error;
mod handlers;
pub mod ingest;
pub mod routes;
pub mod state;
mod uploads;

pub use bootstrap::{build_context, serve};
pub use error::HttpError;
pub use ingest::scan_and_queue;
pub use routes::create_router;
pub use state::{AppContext, AppState};
