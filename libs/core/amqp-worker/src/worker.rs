//! Consumer worker.
//!
//! Per message: `received → decoded → processed → ack`, or on any failure
//! `→ reject(requeue = false)`, which the queue's dead-letter arguments route
//! to the dead-letter queue. Nothing is retried in place, so one poison
//! message cannot block the queue.
//!
//! Each consumer has its own channel with `basic_qos(prefetch)` and handles
//! one delivery to completion before pulling the next. Consumers run
//! concurrently and make no ordering assumptions.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    Channel, Consumer,
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions},
    types::FieldTable,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::connection::Broker;
use crate::error::{BrokerError, ErrorCategory, ProcessError};
use crate::message::IncomingMessage;
use crate::metrics::ConsumerMetrics;
use crate::registry::EventRegistry;

/// Handles one decoded event. Returning `Ok` means the effect is durable and
/// the message may be acknowledged.
#[async_trait]
pub trait EventProcessor<E>: Send + Sync + 'static
where
    E: Send + 'static,
{
    async fn process(&self, event: E, message: &IncomingMessage) -> Result<(), ProcessError>;

    /// Name for logs and metrics
    fn name(&self) -> &'static str;
}

/// How a delivery must be settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Ack,
    DeadLetter {
        category: ErrorCategory,
        reason: String,
    },
}

impl DeliveryOutcome {
    fn from_error(err: ProcessError) -> Self {
        DeliveryOutcome::DeadLetter {
            category: err.category,
            reason: err.message,
        }
    }
}

/// Broker-free core of the worker: decode, process, decide.
pub struct MessageHandler<E, P> {
    registry: Arc<EventRegistry<E>>,
    processor: Arc<P>,
    metrics: ConsumerMetrics,
}

impl<E, P> MessageHandler<E, P>
where
    E: Send + 'static,
    P: EventProcessor<E>,
{
    pub fn new(registry: Arc<EventRegistry<E>>, processor: Arc<P>, queue: &str) -> Self {
        Self {
            registry,
            processor,
            metrics: ConsumerMetrics::new(queue),
        }
    }

    pub async fn handle(&self, message: &IncomingMessage) -> DeliveryOutcome {
        let started = Instant::now();

        if message.redelivered {
            self.metrics.redelivered();
            warn!(
                processor = self.processor.name(),
                type_id = message.type_id.as_deref().unwrap_or("<none>"),
                message_id = message.message_id.as_deref().unwrap_or("<none>"),
                "Processing redelivered message"
            );
        }

        let outcome = match self
            .registry
            .decode(message.type_id.as_deref(), &message.body)
        {
            Ok(event) => match self.processor.process(event, message).await {
                Ok(()) => DeliveryOutcome::Ack,
                Err(err) => DeliveryOutcome::from_error(err),
            },
            Err(err) => DeliveryOutcome::from_error(err.into()),
        };

        match &outcome {
            DeliveryOutcome::Ack => {
                self.metrics.acked(started.elapsed());
                debug!(
                    processor = self.processor.name(),
                    type_id = message.type_id.as_deref().unwrap_or("<none>"),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Message processed"
                );
            }
            DeliveryOutcome::DeadLetter { category, reason } => {
                self.metrics.dead_lettered(category.as_str());
                error!(
                    processor = self.processor.name(),
                    type_id = message.type_id.as_deref().unwrap_or("<none>"),
                    routing_key = %message.routing_key,
                    message_id = message.message_id.as_deref().unwrap_or("<none>"),
                    size = message.size(),
                    category = %category,
                    reason = %reason,
                    "Message rejected to dead-letter queue"
                );
            }
        }

        outcome
    }
}

pub struct EventWorker<E, P> {
    broker: Broker,
    handler: Arc<MessageHandler<E, P>>,
    config: WorkerConfig,
}

impl<E, P> EventWorker<E, P>
where
    E: Send + 'static,
    P: EventProcessor<E>,
{
    pub fn new(
        broker: Broker,
        registry: Arc<EventRegistry<E>>,
        processor: Arc<P>,
        config: WorkerConfig,
    ) -> Self {
        let handler = Arc::new(MessageHandler::new(registry, processor, &config.queue));
        Self {
            broker,
            handler,
            config,
        }
    }

    /// Run `config.consumers` consumers until `shutdown` flips to `true`.
    ///
    /// Consumers reconnect on their own after channel failures, so this
    /// only returns at shutdown.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), BrokerError> {
        info!(
            queue = %self.config.queue,
            consumers = self.config.consumers,
            prefetch = self.config.prefetch,
            "Starting event worker"
        );

        let mut tasks = Vec::with_capacity(self.config.consumers);
        for index in 0..self.config.consumers {
            let consumer = ConsumerLoop {
                broker: self.broker.clone(),
                handler: Arc::clone(&self.handler),
                config: self.config.clone(),
                tag: self.config.consumer_tag_for(index),
            };
            tasks.push(tokio::spawn(consumer.run(shutdown.clone())));
        }

        for task in futures::future::join_all(tasks).await {
            if let Err(e) = task {
                error!(error = %e, "Consumer task panicked");
            }
        }

        info!(queue = %self.config.queue, "Event worker stopped");
        Ok(())
    }
}

/// Shutdown was requested, or its sender is gone.
fn stopping(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

struct ConsumerLoop<E, P> {
    broker: Broker,
    handler: Arc<MessageHandler<E, P>>,
    config: WorkerConfig,
    tag: String,
}

impl<E, P> ConsumerLoop<E, P>
where
    E: Send + 'static,
    P: EventProcessor<E>,
{
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt = 0u32;

        while !stopping(&shutdown) {
            match self.subscribe().await {
                Ok((channel, consumer)) => {
                    info!(queue = %self.config.queue, consumer = %self.tag, "Consumer subscribed");
                    attempt = 0;
                    self.drain(consumer, &mut shutdown).await;
                    // Unacked prefetched deliveries go back to the queue on close
                    let _ = channel.close(200, "consumer stopping").await;
                }
                Err(e) => {
                    error!(
                        queue = %self.config.queue,
                        consumer = %self.tag,
                        error = %e,
                        "Failed to subscribe"
                    );
                }
            }

            if stopping(&shutdown) {
                break;
            }

            let delay = self.config.reconnect_delay(attempt);
            attempt = attempt.saturating_add(1);
            self.handler.metrics.reconnected();
            warn!(
                queue = %self.config.queue,
                consumer = %self.tag,
                delay_ms = delay.as_millis() as u64,
                "Consumer reconnecting after backoff"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!(consumer = %self.tag, "Consumer stopped");
    }

    async fn subscribe(&self) -> Result<(Channel, Consumer), BrokerError> {
        let channel = self.broker.channel().await?;
        channel
            .basic_qos(self.config.prefetch, BasicQosOptions::default())
            .await?;
        let consumer = channel
            .basic_consume(
                &self.config.queue,
                &self.tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok((channel, consumer))
    }

    /// Process deliveries until the stream ends, errors, or shutdown is requested.
    ///
    /// Shutdown is only observed between deliveries, so an in-flight message
    /// is always settled.
    async fn drain(&self, mut consumer: Consumer, shutdown: &mut watch::Receiver<bool>) {
        loop {
            let next = tokio::select! {
                next = consumer.next() => next,
                _ = shutdown.changed() => {
                    info!(consumer = %self.tag, "Shutdown requested, stopping consumption");
                    return;
                }
            };

            match next {
                Some(Ok(delivery)) => self.settle(delivery).await,
                Some(Err(e)) => {
                    error!(consumer = %self.tag, error = %e, "Consumer delivery error");
                    return;
                }
                None => {
                    warn!(consumer = %self.tag, "Consumer stream ended");
                    return;
                }
            }
        }
    }

    async fn settle(&self, delivery: Delivery) {
        let message = IncomingMessage::from_delivery(&delivery);
        let outcome = self.handler.handle(&message).await;

        let result = match outcome {
            DeliveryOutcome::Ack => delivery.ack(BasicAckOptions::default()).await,
            DeliveryOutcome::DeadLetter { .. } => {
                delivery
                    .reject(BasicRejectOptions { requeue: false })
                    .await
            }
        };

        // The broker redelivers anything left unsettled once the channel drops
        if let Err(e) = result {
            error!(
                consumer = %self.tag,
                delivery_tag = delivery.delivery_tag,
                error = %e,
                "Failed to settle delivery"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Greeting(String);

    fn decode_greeting(body: &[u8]) -> Result<Greeting, DecodeError> {
        let text = std::str::from_utf8(body).map_err(|e| DecodeError::malformed("greeting", e))?;
        if text.trim().is_empty() {
            return Err(DecodeError::invalid("greeting", "empty greeting"));
        }
        Ok(Greeting(text.to_string()))
    }

    #[derive(Default)]
    struct RecordingProcessor {
        seen: Mutex<Vec<Greeting>>,
        fail_with: Option<ProcessError>,
    }

    #[async_trait]
    impl EventProcessor<Greeting> for RecordingProcessor {
        async fn process(
            &self,
            event: Greeting,
            _message: &IncomingMessage,
        ) -> Result<(), ProcessError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.seen.lock().unwrap().push(event);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    type TestHandler = MessageHandler<Greeting, RecordingProcessor>;

    fn handler(processor: RecordingProcessor) -> (TestHandler, Arc<RecordingProcessor>) {
        let registry = Arc::new(EventRegistry::new().register("greeting", decode_greeting));
        let processor = Arc::new(processor);
        (
            MessageHandler::new(registry, Arc::clone(&processor), "test.queue"),
            processor,
        )
    }

    fn message(type_id: Option<&str>, body: &str) -> IncomingMessage {
        IncomingMessage::new(type_id, "greeting.sent", body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_valid_message_is_acked_after_processing() {
        let (handler, processor) = handler(RecordingProcessor::default());

        let outcome = handler.handle(&message(Some("greeting"), "hello")).await;

        assert_eq!(outcome, DeliveryOutcome::Ack);
        assert_eq!(*processor.seen.lock().unwrap(), vec![Greeting("hello".into())]);
    }

    #[tokio::test]
    async fn test_unknown_discriminator_is_dead_lettered_without_processing() {
        let (handler, processor) = handler(RecordingProcessor::default());

        let outcome = handler.handle(&message(Some("farewell"), "bye")).await;

        assert!(matches!(
            outcome,
            DeliveryOutcome::DeadLetter { category: ErrorCategory::Decode, .. }
        ));
        assert!(processor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_discriminator_is_dead_lettered() {
        let (handler, _) = handler(RecordingProcessor::default());

        let outcome = handler.handle(&message(None, "hello")).await;

        assert!(matches!(
            outcome,
            DeliveryOutcome::DeadLetter { category: ErrorCategory::Decode, .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_event_is_mapping_failure() {
        let (handler, _) = handler(RecordingProcessor::default());

        let outcome = handler.handle(&message(Some("greeting"), "   ")).await;

        assert!(matches!(
            outcome,
            DeliveryOutcome::DeadLetter { category: ErrorCategory::Mapping, .. }
        ));
    }

    #[tokio::test]
    async fn test_processor_failure_is_dead_lettered() {
        let (handler, _) = handler(RecordingProcessor {
            fail_with: Some(ProcessError::persistence("database unavailable")),
            ..Default::default()
        });

        let outcome = handler.handle(&message(Some("greeting"), "hello")).await;

        assert_eq!(
            outcome,
            DeliveryOutcome::DeadLetter {
                category: ErrorCategory::Persistence,
                reason: "database unavailable".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_poison_message_does_not_block_following_messages() {
        let (handler, processor) = handler(RecordingProcessor::default());

        let first = handler.handle(&message(Some("farewell"), "bye")).await;
        let second = handler.handle(&message(Some("greeting"), "hi")).await;

        assert!(matches!(first, DeliveryOutcome::DeadLetter { .. }));
        assert_eq!(second, DeliveryOutcome::Ack);
        assert_eq!(processor.seen.lock().unwrap().len(), 1);
    }
}
