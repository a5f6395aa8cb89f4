//! The worker consume loop.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use revid_broker::Broker;
use revid_core::{Envelope, Settings};

use crate::encode;
use crate::error::WorkerError;
use crate::metric;

/// Everything a task run needs: immutable settings, a shared HTTP client,
/// and this worker's identity for the `Worker` header.
pub struct WorkerContext {
    pub settings: Settings,
    pub client: reqwest::Client,
    pub hostname: String,
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| format!("worker-{}", std::process::id()))
}

/// Run the worker until the process is stopped.
///
/// One message at a time: `prefetch=1` serializes deliveries, and the
/// acknowledgement happens only after the task's artifact or report is
/// uploaded. A failure requeues the message (after the retry delay, so a
/// persistently failing task does not spin hot); a deleted task
/// acknowledges and drops it.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&settings.paths.work).await?;

    let broker = Broker::connect(&settings.rabbitmq).await?;
    let ctx = WorkerContext {
        client: reqwest::Client::new(),
        hostname: hostname(),
        settings,
    };

    let mut deliveries = broker.consume(&ctx.hostname).await?;
    info!(worker = %ctx.hostname, "ready to receive work");

    while let Some(delivery) = deliveries.next().await {
        let delivery = delivery?;

        let envelope = match delivery.envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                // Poison message: not one of the known envelope shapes.
                // Acknowledge it so it cannot redeliver forever.
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(delivery.payload()),
                    "unparseable message; acknowledging and dropping"
                );
                delivery.ack().await?;
                continue;
            }
        };

        info!(
            kind = envelope.kind(),
            id = envelope.id(),
            "received task; beginning processing"
        );

        match process(&ctx, &envelope).await {
            Ok(()) => {
                delivery.ack().await?;
                debug!(id = envelope.id(), "task processed; waiting for new tasks");
            }
            Err(WorkerError::TaskGone(url)) => {
                warn!(url, "task no longer exists; acknowledging and dropping");
                delivery.ack().await?;
            }
            Err(e) => {
                error!(
                    id = envelope.id(),
                    error = %e,
                    "task failed; returning message for redelivery"
                );
                tokio::time::sleep(Duration::from_secs(ctx.settings.retry_delay_secs)).await;
                delivery.requeue().await?;
            }
        }
    }

    Ok(())
}

/// Stage a scratch directory, run the task, and always clean up.
async fn process(ctx: &WorkerContext, envelope: &Envelope) -> Result<(), WorkerError> {
    let task_dir = ctx
        .settings
        .paths
        .work
        .join(format!("{}-{}", envelope.kind(), envelope.id()));
    tokio::fs::create_dir_all(&task_dir).await?;

    let result = match envelope {
        Envelope::Encode { url, .. } => encode::process(ctx, url, &task_dir).await,
        Envelope::Metrics { url, .. } => metric::process(ctx, url, &task_dir).await,
    };

    debug!(dir = %task_dir.display(), "removing work directory");
    let _ = tokio::fs::remove_dir_all(&task_dir).await;

    result
}
