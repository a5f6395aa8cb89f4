//! RabbitMQ adapter.
//!
//! One durable queue carries every task envelope. Publishes are
//! persistent; consumers run with `prefetch=1` and manual acknowledgement,
//! so a worker holds at most one unacknowledged message and a crash before
//! ack makes the broker redeliver it. The lapin connection keeps AMQP
//! heartbeats flowing on its own background task, so long encodes never
//! starve the connection.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, info};

use revid_core::settings::RabbitSettings;
use revid_core::{Envelope, QueueError, TaskQueue};

/// Delivery mode 2 marks a message persistent.
const PERSISTENT: u8 = 2;

/// A connected broker channel bound to the configured queue.
pub struct Broker {
    channel: Channel,
    queue: String,
}

impl Broker {
    /// Connect and declare the durable queue.
    pub async fn connect(settings: &RabbitSettings) -> Result<Self, QueueError> {
        let uri = settings.amqp_uri();
        debug!(uri = %uri, "connecting to broker");

        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        channel
            .queue_declare(
                &settings.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        info!(queue = %settings.queue, "broker connected");
        Ok(Self {
            channel,
            queue: settings.queue.clone(),
        })
    }

    /// Start consuming with `prefetch=1` and manual acknowledgement.
    pub async fn consume(&self, consumer_tag: &str) -> Result<TaskStream, QueueError> {
        self.channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        let consumer = self
            .channel
            .basic_consume(
                &self.queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        Ok(TaskStream { consumer })
    }
}

#[async_trait]
impl TaskQueue for Broker {
    async fn publish(&self, envelope: &Envelope) -> Result<(), QueueError> {
        let payload =
            serde_json::to_vec(envelope).map_err(|e| QueueError::Publish(e.to_string()))?;

        let confirm = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;
        confirm
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;

        debug!(kind = envelope.kind(), id = envelope.id(), "envelope published");
        Ok(())
    }
}

/// Stream of deliveries for one consumer.
pub struct TaskStream {
    consumer: lapin::Consumer,
}

impl TaskStream {
    /// Wait for the next delivery; `None` when the broker closed the
    /// consumer.
    pub async fn next(&mut self) -> Option<Result<TaskDelivery, QueueError>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|delivery| TaskDelivery { delivery })
                .map_err(|e| QueueError::Consume(e.to_string())),
        )
    }
}

/// One claimed message.
///
/// Acknowledge only after the task's results have been uploaded; dropping
/// the delivery unacknowledged (or nacking it) sends the message back to
/// the queue.
pub struct TaskDelivery {
    delivery: Delivery,
}

impl TaskDelivery {
    /// Parse the payload into an envelope.
    ///
    /// An `Err` here means a poison message: the payload is not one of the
    /// known envelope shapes. Callers ack-and-log those instead of letting
    /// them redeliver forever.
    pub fn envelope(&self) -> Result<Envelope, serde_json::Error> {
        serde_json::from_slice(&self.delivery.data)
    }

    /// Raw payload, for poison-message logging.
    pub fn payload(&self) -> &[u8] {
        &self.delivery.data
    }

    /// Acknowledge the message, removing it from the queue.
    pub async fn ack(self) -> Result<(), QueueError> {
        self.delivery
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))
    }

    /// Return the message to the queue for redelivery.
    pub async fn requeue(self) -> Result<(), QueueError> {
        self.delivery
            .nack(lapin::options::BasicNackOptions {
                requeue: true,
                ..lapin::options::BasicNackOptions::default()
            })
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))
    }
}
