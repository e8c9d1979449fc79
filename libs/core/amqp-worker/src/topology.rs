//! Exchange/queue layout and its idempotent declaration.
//!
//! ```text
//! publisher ──► EXCHANGE (topic) ──ROUTING_KEYS──► QUEUE ──► consumers
//!                                                   │ reject(requeue=false) / TTL expiry
//!                                                   ▼
//!               DEAD_LETTER_EXCHANGE (direct) ──DEAD_LETTER_ROUTING_KEY──► DEAD_LETTER_QUEUE (TTL)
//! ```
//!
//! Declaring with the same names and arguments is a no-op on the broker, so
//! every process declares on startup. Declaring an existing queue with
//! *different* arguments fails with PRECONDITION_FAILED, which surfaces as
//! [`BrokerError::Topology`].

use core_config::amqp::AmqpConfig;
use lapin::{
    Channel, ExchangeKind,
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable},
};
use tracing::info;

use crate::error::BrokerError;

pub const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";
pub const DEAD_LETTER_ROUTING_KEY_ARG: &str = "x-dead-letter-routing-key";
pub const MESSAGE_TTL_ARG: &str = "x-message-ttl";

/// Names that producer and consumer deployments must agree on.
pub trait TopologyDef: Send + Sync {
    /// Topic exchange carrying domain events
    const EXCHANGE: &'static str;

    /// Durable queue owned by the consuming service
    const QUEUE: &'static str;

    /// Keys binding `QUEUE` to `EXCHANGE`, one per consumed event type
    const ROUTING_KEYS: &'static [&'static str];

    const DEAD_LETTER_EXCHANGE: &'static str;

    const DEAD_LETTER_QUEUE: &'static str;

    const DEAD_LETTER_ROUTING_KEY: &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub queue: String,
    pub routing_keys: Vec<String>,
    pub dead_letter_exchange: String,
    pub dead_letter_queue: String,
    pub dead_letter_routing_key: String,
    pub queue_ttl_ms: u32,
    pub dead_letter_ttl_ms: u32,
}

impl Topology {
    pub fn from_def<T: TopologyDef>(config: &AmqpConfig) -> Self {
        Self {
            exchange: T::EXCHANGE.to_string(),
            queue: T::QUEUE.to_string(),
            routing_keys: T::ROUTING_KEYS.iter().map(|k| k.to_string()).collect(),
            dead_letter_exchange: T::DEAD_LETTER_EXCHANGE.to_string(),
            dead_letter_queue: T::DEAD_LETTER_QUEUE.to_string(),
            dead_letter_routing_key: T::DEAD_LETTER_ROUTING_KEY.to_string(),
            queue_ttl_ms: config.queue_ttl_ms,
            dead_letter_ttl_ms: config.dlq_ttl_ms,
        }
    }

    /// Arguments of the primary queue: dead-letter routing and message TTL
    pub fn queue_arguments(&self) -> FieldTable {
        let mut args = FieldTable::default();
        args.insert(
            DEAD_LETTER_EXCHANGE_ARG.into(),
            AMQPValue::LongString(self.dead_letter_exchange.clone().into()),
        );
        args.insert(
            DEAD_LETTER_ROUTING_KEY_ARG.into(),
            AMQPValue::LongString(self.dead_letter_routing_key.clone().into()),
        );
        args.insert(
            MESSAGE_TTL_ARG.into(),
            AMQPValue::LongUInt(self.queue_ttl_ms),
        );
        args
    }

    pub fn dead_letter_queue_arguments(&self) -> FieldTable {
        let mut args = FieldTable::default();
        args.insert(
            MESSAGE_TTL_ARG.into(),
            AMQPValue::LongUInt(self.dead_letter_ttl_ms),
        );
        args
    }

    /// Declare everything on `channel`. Safe to repeat.
    ///
    /// The dead-letter side is declared first so the primary queue never
    /// exists without somewhere to send its rejects.
    pub async fn declare(&self, channel: &Channel) -> Result<(), BrokerError> {
        let durable_exchange = ExchangeDeclareOptions {
            durable: true,
            ..Default::default()
        };
        let durable_queue = QueueDeclareOptions {
            durable: true,
            ..Default::default()
        };

        channel
            .exchange_declare(
                &self.dead_letter_exchange,
                ExchangeKind::Direct,
                durable_exchange,
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::topology(&self.dead_letter_exchange, e))?;

        channel
            .queue_declare(
                &self.dead_letter_queue,
                durable_queue,
                self.dead_letter_queue_arguments(),
            )
            .await
            .map_err(|e| BrokerError::topology(&self.dead_letter_queue, e))?;

        channel
            .queue_bind(
                &self.dead_letter_queue,
                &self.dead_letter_exchange,
                &self.dead_letter_routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::topology(&self.dead_letter_queue, e))?;

        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                durable_exchange,
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::topology(&self.exchange, e))?;

        channel
            .queue_declare(&self.queue, durable_queue, self.queue_arguments())
            .await
            .map_err(|e| BrokerError::topology(&self.queue, e))?;

        for routing_key in &self.routing_keys {
            channel
                .queue_bind(
                    &self.queue,
                    &self.exchange,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| BrokerError::topology(&self.queue, e))?;
        }

        info!(
            exchange = %self.exchange,
            queue = %self.queue,
            routing_keys = ?self.routing_keys,
            dead_letter_queue = %self.dead_letter_queue,
            queue_ttl_ms = self.queue_ttl_ms,
            dead_letter_ttl_ms = self.dead_letter_ttl_ms,
            "Broker topology declared"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestTopology;

    impl TopologyDef for TestTopology {
        const EXCHANGE: &'static str = "test-events";
        const QUEUE: &'static str = "test-service.queue";
        const ROUTING_KEYS: &'static [&'static str] = &["thing.created", "thing.deleted"];
        const DEAD_LETTER_EXCHANGE: &'static str = "test-events.dlx";
        const DEAD_LETTER_QUEUE: &'static str = "test-service.dlx.queue";
        const DEAD_LETTER_ROUTING_KEY: &'static str = "dead-letter.test-service";
    }

    fn topology() -> Topology {
        let config = AmqpConfig {
            queue_ttl_ms: 60_000,
            dlq_ttl_ms: 120_000,
            ..AmqpConfig::default()
        };
        Topology::from_def::<TestTopology>(&config)
    }

    #[test]
    fn test_from_def_copies_names_and_ttls() {
        let topology = topology();
        assert_eq!(topology.exchange, "test-events");
        assert_eq!(topology.queue, "test-service.queue");
        assert_eq!(topology.routing_keys, vec!["thing.created", "thing.deleted"]);
        assert_eq!(topology.queue_ttl_ms, 60_000);
        assert_eq!(topology.dead_letter_ttl_ms, 120_000);
    }

    #[test]
    fn test_queue_arguments_route_rejects_to_dead_letter_exchange() {
        let args = topology().queue_arguments();
        let inner = args.inner();

        assert_eq!(
            inner.get(DEAD_LETTER_EXCHANGE_ARG),
            Some(&AMQPValue::LongString("test-events.dlx".into()))
        );
        assert_eq!(
            inner.get(DEAD_LETTER_ROUTING_KEY_ARG),
            Some(&AMQPValue::LongString("dead-letter.test-service".into()))
        );
        assert_eq!(inner.get(MESSAGE_TTL_ARG), Some(&AMQPValue::LongUInt(60_000)));
    }

    #[test]
    fn test_dead_letter_queue_has_ttl_only() {
        let args = topology().dead_letter_queue_arguments();
        assert_eq!(args.inner().len(), 1);
        assert_eq!(
            args.inner().get(MESSAGE_TTL_ARG),
            Some(&AMQPValue::LongUInt(120_000))
        );
    }
}
