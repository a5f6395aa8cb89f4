//! Queue envelope and publisher port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message published to the work queue, one per queued task.
///
/// The tag makes the two task kinds statically exhaustive for consumers;
/// a payload with any other `type` fails deserialization and is handled as
/// poison (logged and acknowledged, never redelivered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// An encode task; `url` is the absolute coordinator task-detail URL.
    #[serde(rename = "encode")]
    Encode { id: i64, url: String },
    /// A metric task.
    #[serde(rename = "metrics")]
    Metrics { id: i64, url: String },
}

impl Envelope {
    pub fn id(&self) -> i64 {
        match self {
            Envelope::Encode { id, .. } | Envelope::Metrics { id, .. } => *id,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Envelope::Encode { url, .. } | Envelope::Metrics { url, .. } => url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Encode { .. } => "encode",
            Envelope::Metrics { .. } => "metrics",
        }
    }
}

/// Errors from the broker adapter.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("broker connection failed: {0}")]
    Connection(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("consume failed: {0}")]
    Consume(String),
}

/// Publishing side of the task queue.
///
/// Implemented by the broker adapter; the coordinator publishes one
/// envelope per queued task and re-publishes on quarantine.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn publish(&self, envelope: &Envelope) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips() {
        let envelope = Envelope::Encode {
            id: 17,
            url: "http://coordinator:8080/api/encodes/tasks/17".into(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"type\":\"encode\""));
        assert!(json.contains("\"id\":17"));

        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let raw = r#"{"type": "thumbnails", "id": 1, "url": "http://x/1"}"#;
        assert!(serde_json::from_str::<Envelope>(raw).is_err());
    }

    #[test]
    fn metrics_envelope_parses() {
        let raw = r#"{"type": "metrics", "id": 3, "url": "http://c:8080/api/metrics/tasks/3"}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.id(), 3);
        assert_eq!(envelope.kind(), "metrics");
    }
}
