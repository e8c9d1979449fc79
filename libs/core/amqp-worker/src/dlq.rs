//! Dead-letter queue inspection and replay.
//!
//! Messages land here unchanged apart from the broker's `x-death` header,
//! which records why and from where they were dead-lettered.

use lapin::{
    BasicProperties, Channel,
    message::Delivery,
    options::{BasicAckOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions,
        ConfirmSelectOptions, QueuePurgeOptions},
    publisher_confirm::Confirmation,
    types::{AMQPValue, FieldTable},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::connection::Broker;
use crate::error::BrokerError;
use crate::message::type_id_of;
use crate::topology::Topology;

const X_DEATH_HEADER: &str = "x-death";
const BODY_PREVIEW_BYTES: usize = 512;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DlqStats {
    pub queue: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

/// One dead-lettered message as seen by operators.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DlqEntry {
    pub message_id: Option<String>,
    pub type_id: Option<String>,
    pub original_routing_key: Option<String>,
    /// `rejected`, `expired`, `maxlen` or `delivery_limit`
    pub reason: Option<String>,
    pub death_count: i64,
    pub size: usize,
    pub body_preview: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReplayResult {
    pub replayed: u32,
    pub failed: u32,
}

/// Most recent `x-death` record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Death {
    reason: Option<String>,
    count: i64,
    routing_key: Option<String>,
}

#[derive(Clone)]
pub struct DlqInspector {
    broker: Broker,
    topology: Arc<Topology>,
}

impl DlqInspector {
    pub fn new(broker: Broker, topology: Arc<Topology>) -> Self {
        Self { broker, topology }
    }

    pub async fn stats(&self) -> Result<DlqStats, BrokerError> {
        let (message_count, consumer_count) = self
            .broker
            .queue_depth(&self.topology.dead_letter_queue)
            .await?;
        Ok(DlqStats {
            queue: self.topology.dead_letter_queue.clone(),
            message_count,
            consumer_count,
        })
    }

    /// Read up to `limit` messages and put them all back.
    pub async fn peek(&self, limit: usize) -> Result<Vec<DlqEntry>, BrokerError> {
        let channel = self.broker.channel().await?;
        let mut held = Vec::new();

        while held.len() < limit {
            match self.get(&channel).await? {
                Some(delivery) => held.push(delivery),
                None => break,
            }
        }

        let entries = held.iter().map(entry_of).collect();

        for delivery in held {
            delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                })
                .await?;
        }
        let _ = channel.close(200, "dlq peek").await;

        Ok(entries)
    }

    /// Republish up to `limit` messages to the main exchange under their
    /// original routing key.
    ///
    /// A message is only removed from the dead-letter queue once the broker
    /// confirmed the republish.
    pub async fn replay(&self, limit: usize) -> Result<ReplayResult, BrokerError> {
        let channel = self.broker.channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        let mut result = ReplayResult::default();
        while ((result.replayed + result.failed) as usize) < limit {
            let Some(delivery) = self.get(&channel).await? else {
                break;
            };

            let routing_key = death_of(&delivery.properties)
                .routing_key
                .or_else(|| self.topology.routing_keys.first().cloned())
                .unwrap_or_default();

            match self.republish(&channel, &delivery, &routing_key).await {
                Ok(()) => {
                    delivery.ack(BasicAckOptions::default()).await?;
                    result.replayed += 1;
                }
                Err(e) => {
                    warn!(routing_key = %routing_key, error = %e, "Replay failed, message kept");
                    delivery
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        })
                        .await?;
                    result.failed += 1;
                    // Requeued messages would come straight back
                    break;
                }
            }
        }
        let _ = channel.close(200, "dlq replay").await;

        info!(
            queue = %self.topology.dead_letter_queue,
            exchange = %self.topology.exchange,
            replayed = result.replayed,
            failed = result.failed,
            "Dead-letter replay finished"
        );
        Ok(result)
    }

    /// Drop every message in the dead-letter queue.
    pub async fn purge(&self) -> Result<u32, BrokerError> {
        let channel = self.broker.channel().await?;
        let purged = channel
            .queue_purge(&self.topology.dead_letter_queue, QueuePurgeOptions::default())
            .await?;
        let _ = channel.close(200, "dlq purge").await;

        warn!(queue = %self.topology.dead_letter_queue, purged, "Dead-letter queue purged");
        Ok(purged)
    }

    async fn get(&self, channel: &Channel) -> Result<Option<Delivery>, BrokerError> {
        let message = channel
            .basic_get(&self.topology.dead_letter_queue, BasicGetOptions { no_ack: false })
            .await?;
        Ok(message.map(|m| m.delivery))
    }

    async fn republish(
        &self,
        channel: &Channel,
        delivery: &Delivery,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        let confirmation = channel
            .basic_publish(
                &self.topology.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &delivery.data,
                replay_properties(&delivery.properties),
            )
            .await?
            .await?;

        match confirmation {
            Confirmation::Nack(_) => Err(BrokerError::Nacked {
                exchange: self.topology.exchange.clone(),
                routing_key: routing_key.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn entry_of(delivery: &Delivery) -> DlqEntry {
    let death = death_of(&delivery.properties);
    let preview_len = delivery.data.len().min(BODY_PREVIEW_BYTES);

    DlqEntry {
        message_id: delivery
            .properties
            .message_id()
            .as_ref()
            .map(|id| id.as_str().to_string()),
        type_id: type_id_of(&delivery.properties),
        original_routing_key: death.routing_key,
        reason: death.reason,
        death_count: death.count,
        size: delivery.data.len(),
        body_preview: String::from_utf8_lossy(&delivery.data[..preview_len]).into_owned(),
    }
}

/// Original properties, persistent, without the `x-death` history.
fn replay_properties(original: &BasicProperties) -> BasicProperties {
    let mut headers = FieldTable::default();
    if let Some(existing) = original.headers() {
        for (key, value) in existing.inner() {
            if key.as_str() != X_DEATH_HEADER {
                headers.insert(key.clone(), value.clone());
            }
        }
    }

    let mut properties = BasicProperties::default()
        .with_delivery_mode(2)
        .with_headers(headers);
    if let Some(content_type) = original.content_type() {
        properties = properties.with_content_type(content_type.clone());
    }
    if let Some(message_id) = original.message_id() {
        properties = properties.with_message_id(message_id.clone());
    }
    properties
}

fn death_of(properties: &BasicProperties) -> Death {
    let Some(AMQPValue::FieldArray(deaths)) = properties
        .headers()
        .as_ref()
        .and_then(|h| h.inner().get(X_DEATH_HEADER))
    else {
        return Death::default();
    };

    // The broker keeps the most recent death first
    let Some(AMQPValue::FieldTable(latest)) = deaths.as_slice().first() else {
        return Death::default();
    };
    let fields = latest.inner();

    Death {
        reason: fields.get("reason").and_then(as_string),
        count: fields.get("count").and_then(as_integer).unwrap_or(0),
        routing_key: match fields.get("routing-keys") {
            Some(AMQPValue::FieldArray(keys)) => keys.as_slice().first().and_then(as_string),
            _ => None,
        },
    }
}

fn as_string(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}

fn as_integer(value: &AMQPValue) -> Option<i64> {
    match value {
        AMQPValue::LongLongInt(n) => Some(*n),
        AMQPValue::LongInt(n) => Some(i64::from(*n)),
        AMQPValue::LongUInt(n) => Some(i64::from(*n)),
        AMQPValue::ShortInt(n) => Some(i64::from(*n)),
        AMQPValue::ShortUInt(n) => Some(i64::from(*n)),
        _ => None,
    }
}
