//! Domain Events
//!
//! Wire schema for events exchanged over the broker. Producers publish with
//! [`amqp_worker::DetachedPublisher`]; consumers decode with [`registry`].
//!
//! The discriminator travels in the `__TypeId__` header, never only in the
//! body, so a consumer selects the decoder before parsing anything.

pub mod codec;
pub mod models;

pub use codec::{decode_answer_created, registry};
pub use models::{AnswerCreatedEvent, DomainEvent, EventType};

/// Topic exchange carrying every domain event
pub const DOMAIN_EVENTS_EXCHANGE: &str = "question-events";
