//! Event publishing.
//!
//! [`AmqpPublisher`] does one persistent, confirmed publish per call.
//! [`DetachedPublisher`] sits in front of it so request paths hand off an
//! event and return immediately; failures past that point are logged and
//! counted, never returned to the caller.

use async_trait::async_trait;
use core_config::amqp::AmqpConfig;
use lapin::{
    BasicProperties, Channel,
    options::{BasicPublishOptions, ConfirmSelectOptions},
    publisher_confirm::Confirmation,
    types::{AMQPValue, FieldTable},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::connection::Broker;
use crate::error::BrokerError;
use crate::message::TYPE_ID_HEADER;
use crate::metrics::PublisherMetrics;

/// An event that knows its own discriminator and routing key.
pub trait OutboundEvent: Serialize + Send + Sync {
    /// Value of the `__TypeId__` header
    fn type_id(&self) -> &'static str;

    fn routing_key(&self) -> &'static str;
}

/// A serialized event ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub type_id: String,
    pub message_id: String,
    pub body: Vec<u8>,
}

impl OutboundMessage {
    pub fn from_event<E: OutboundEvent>(event: &E, exchange: &str) -> Result<Self, BrokerError> {
        Ok(Self {
            exchange: exchange.to_string(),
            routing_key: event.routing_key().to_string(),
            type_id: event.type_id().to_string(),
            message_id: Uuid::now_v7().to_string(),
            body: serde_json::to_vec(event)?,
        })
    }

    pub fn properties(&self) -> BasicProperties {
        let mut headers = FieldTable::default();
        headers.insert(
            TYPE_ID_HEADER.into(),
            AMQPValue::LongString(self.type_id.as_str().into()),
        );

        BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2) // persistent
            .with_message_id(self.message_id.as_str().into())
            .with_headers(headers)
    }
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError>;
}

/// Confirmed publisher over a cached channel.
///
/// The channel is reopened after any failure.
pub struct AmqpPublisher {
    broker: Broker,
    timeout: Duration,
    channel: Mutex<Option<Channel>>,
}

impl AmqpPublisher {
    pub fn new(broker: Broker, timeout: Duration) -> Self {
        Self {
            broker,
            timeout,
            channel: Mutex::new(None),
        }
    }

    async fn confirmed_channel(&self) -> Result<Channel, BrokerError> {
        let mut cached = self.channel.lock().await;
        if let Some(channel) = cached.as_ref()
            && channel.status().connected()
        {
            return Ok(channel.clone());
        }

        let channel = self.broker.channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        debug!(channel_id = channel.id(), "Opened publisher channel");
        *cached = Some(channel.clone());
        Ok(channel)
    }

    async fn publish_confirmed(&self, message: &OutboundMessage) -> Result<(), BrokerError> {
        let channel = self.confirmed_channel().await?;
        let confirmation = channel
            .basic_publish(
                &message.exchange,
                &message.routing_key,
                BasicPublishOptions::default(),
                &message.body,
                message.properties(),
            )
            .await?
            .await?;

        match confirmation {
            Confirmation::Nack(_) => Err(BrokerError::Nacked {
                exchange: message.exchange.clone(),
                routing_key: message.routing_key.clone(),
            }),
            Confirmation::Ack(_) | Confirmation::NotRequested => Ok(()),
        }
    }
}

#[async_trait]
impl MessagePublisher for AmqpPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        let result = match tokio::time::timeout(self.timeout, self.publish_confirmed(&message)).await
        {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Timeout(self.timeout)),
        };

        if result.is_err() {
            self.channel.lock().await.take();
        } else {
            debug!(
                exchange = %message.exchange,
                routing_key = %message.routing_key,
                type_id = %message.type_id,
                message_id = %message.message_id,
                "Published event"
            );
        }

        result
    }
}

/// Fire-and-forget front for a [`MessagePublisher`].
///
/// Events go through a bounded queue to one background task. A full queue
/// drops the event with a warning rather than blocking the caller.
#[derive(Clone)]
pub struct DetachedPublisher {
    tx: mpsc::Sender<OutboundMessage>,
    exchange: String,
    metrics: PublisherMetrics,
}

impl DetachedPublisher {
    /// Start the background task. It exits once every clone of the returned
    /// publisher is dropped and the queue is drained.
    pub fn spawn(
        publisher: Arc<dyn MessagePublisher>,
        capacity: usize,
        exchange: impl Into<String>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<OutboundMessage>(capacity.max(1));
        let metrics = PublisherMetrics;
        let task_metrics = metrics.clone();

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match publisher.publish(message.clone()).await {
                    Ok(()) => task_metrics.published(&message.exchange, &message.routing_key),
                    Err(e) => {
                        task_metrics.failed(&message.exchange, &message.routing_key);
                        error!(
                            exchange = %message.exchange,
                            routing_key = %message.routing_key,
                            type_id = %message.type_id,
                            message_id = %message.message_id,
                            error = %e,
                            "Failed to publish event, dropping it"
                        );
                    }
                }
            }
            info!("Detached publisher drained");
        });

        (
            Self {
                tx,
                exchange: exchange.into(),
                metrics,
            },
            handle,
        )
    }

    /// [`AmqpPublisher`] behind a detached queue, sized and timed from
    /// `AMQP_PUBLISH_BUFFER` and `AMQP_PUBLISH_TIMEOUT_MS`.
    pub fn from_config(
        broker: Broker,
        config: &AmqpConfig,
        exchange: impl Into<String>,
    ) -> (Self, JoinHandle<()>) {
        let publisher = AmqpPublisher::new(broker, config.publish_timeout);
        Self::spawn(Arc::new(publisher), config.publish_buffer, exchange)
    }

    /// Queue `event` for publishing. Returns whether it was accepted.
    pub fn submit<E: OutboundEvent>(&self, event: &E) -> bool {
        let message = match OutboundMessage::from_event(event, &self.exchange) {
            Ok(message) => message,
            Err(e) => {
                self.metrics.failed(&self.exchange, event.routing_key());
                error!(type_id = event.type_id(), error = %e, "Failed to serialize event");
                return false;
            }
        };

        let routing_key = message.routing_key.clone();
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.metrics.dropped(&self.exchange, &routing_key);
                warn!(
                    routing_key = %routing_key,
                    message_id = %message.message_id,
                    error = %BrokerError::QueueFull,
                    "Dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                self.metrics.dropped(&self.exchange, &routing_key);
                warn!(
                    routing_key = %routing_key,
                    message_id = %message.message_id,
                    error = %BrokerError::Closed,
                    "Dropping event"
                );
                false
            }
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }
}
