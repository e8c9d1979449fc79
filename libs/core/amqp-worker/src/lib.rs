//! AMQP Worker Framework
//!
//! RabbitMQ plumbing for event-driven services.
//!
//! ## Features
//!
//! - **Topology**: idempotent declaration of a topic exchange, a consuming
//!   queue with dead-letter routing and TTL, and the dead-letter pair
//! - **Discriminator registry**: `__TypeId__` header → decode function; unknown
//!   types are rejected before the body is parsed
//! - **Consumer worker**: `EventWorker<E, P>` runs N consumers, one message in
//!   flight each, acknowledging only after the processor succeeds and
//!   dead-lettering everything else
//! - **Publisher**: persistent, confirmed publishes behind a detached queue so
//!   callers never wait on the broker
//! - **Dead-letter inspection**: stats, peek, replay, purge
//! - **Prometheus metrics** and **admin endpoints** (`/health`, `/ready`, `/metrics`, `/dlq/*`)
//!
//! ## Example
//!
//! ```ignore
//! use amqp_worker::{Broker, EventRegistry, EventWorker, Topology, TopologyDef, WorkerConfig};
//!
//! struct OrdersTopology;
//! impl TopologyDef for OrdersTopology {
//!     const EXCHANGE: &'static str = "order-events";
//!     const QUEUE: &'static str = "billing.queue";
//!     const ROUTING_KEYS: &'static [&'static str] = &["order.placed"];
//!     const DEAD_LETTER_EXCHANGE: &'static str = "order-events.dlx";
//!     const DEAD_LETTER_QUEUE: &'static str = "billing.dlx.queue";
//!     const DEAD_LETTER_ROUTING_KEY: &'static str = "dead-letter.billing";
//! }
//!
//! let broker = Broker::connect(&amqp_config).await?;
//! let topology = Topology::from_def::<OrdersTopology>(&amqp_config);
//! broker.declare(&topology).await?;
//!
//! let worker = EventWorker::new(broker, registry, processor, WorkerConfig::for_topology(&topology));
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod connection;
mod dlq;
mod error;
mod health;
mod message;
pub mod metrics;
mod publisher;
mod registry;
mod topology;
mod worker;

pub use config::WorkerConfig;
pub use connection::Broker;
pub use dlq::{DlqEntry, DlqInspector, DlqStats, ReplayResult};
pub use error::{BrokerError, DecodeError, ErrorCategory, ProcessError};
pub use health::{AdminState, ReadinessProbe, admin_router};
pub use message::{IncomingMessage, TYPE_ID_HEADER};
pub use metrics::{ConsumerMetrics, PublisherMetrics, init_metrics, render_metrics};
pub use publisher::{
    AmqpPublisher, DetachedPublisher, MessagePublisher, OutboundEvent, OutboundMessage,
};
pub use registry::{DecodeFn, EventRegistry};
pub use topology::{Topology, TopologyDef};
pub use worker::{DeliveryOutcome, EventProcessor, EventWorker, MessageHandler};
