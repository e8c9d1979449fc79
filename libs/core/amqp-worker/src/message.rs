//! Broker-agnostic view of a delivery.

use lapin::{
    BasicProperties,
    types::{AMQPValue, FieldTable},
};

/// Header carrying the event type discriminator.
///
/// Consumers pick a decoder from this header without looking at the body.
pub const TYPE_ID_HEADER: &str = "__TypeId__";

/// What a processor sees of a delivery: decoding metadata plus the raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub type_id: Option<String>,
    pub routing_key: String,
    pub message_id: Option<String>,
    pub redelivered: bool,
    pub body: Vec<u8>,
}

impl IncomingMessage {
    pub fn new(type_id: Option<&str>, routing_key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            type_id: type_id.map(str::to_string),
            routing_key: routing_key.into(),
            message_id: None,
            redelivered: false,
            body,
        }
    }

    pub fn from_delivery(delivery: &lapin::message::Delivery) -> Self {
        let properties = &delivery.properties;
        Self {
            type_id: type_id_of(properties),
            routing_key: delivery.routing_key.as_str().to_string(),
            message_id: properties
                .message_id()
                .as_ref()
                .map(|id| id.as_str().to_string()),
            redelivered: delivery.redelivered,
            body: delivery.data.clone(),
        }
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Discriminator from the `__TypeId__` header, if present and textual.
pub fn type_id_of(properties: &BasicProperties) -> Option<String> {
    properties
        .headers()
        .as_ref()
        .and_then(|headers| header_str(headers, TYPE_ID_HEADER))
}

/// String value of `key`, accepting both long and short AMQP strings.
pub fn header_str(headers: &FieldTable, key: &str) -> Option<String> {
    match headers.inner().get(key)? {
        AMQPValue::LongString(s) => std::str::from_utf8(s.as_bytes()).ok().map(str::to_string),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}
