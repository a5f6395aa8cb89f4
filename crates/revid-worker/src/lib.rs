//! Worker agent.
//!
//! A worker is a long-running consumer that claims one queue message at a
//! time (`prefetch=1`), downloads the task's inputs into a scratch
//! directory, supervises the transcoder, streams results back to the
//! coordinator, and only then acknowledges the message. Any failure before
//! the acknowledgement returns the message to the queue.

mod agent;
mod encode;
mod error;
mod metric;
mod reporter;
mod supervise;
mod transfer;

pub use agent::{run, WorkerContext};
pub use error::WorkerError;
