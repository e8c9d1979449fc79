//! Broker and message-processing errors.
//!
//! A message that cannot be processed is dead-lettered whatever the cause.
//! The category only labels logs and metrics:
//! - **Decode**: unknown or missing discriminator, malformed body
//! - **Mapping**: body parsed but a required field is missing or inconsistent
//! - **Persistence**: the downstream store failed

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Decode,
    Mapping,
    Persistence,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Decode => "decode",
            ErrorCategory::Mapping => "mapping",
            ErrorCategory::Persistence => "persistence",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to turn a raw message into a typed event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message has no type discriminator header")]
    MissingType,

    #[error("unknown type discriminator '{0}'")]
    UnknownType(String),

    #[error("malformed '{type_id}' body: {reason}")]
    Malformed { type_id: String, reason: String },

    #[error("invalid '{type_id}' event: {reason}")]
    Invalid { type_id: String, reason: String },
}

impl DecodeError {
    pub fn malformed(type_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        DecodeError::Malformed {
            type_id: type_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid(type_id: impl Into<String>, reason: impl Into<String>) -> Self {
        DecodeError::Invalid {
            type_id: type_id.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DecodeError::Invalid { .. } => ErrorCategory::Mapping,
            _ => ErrorCategory::Decode,
        }
    }
}

/// Returned by an [`EventProcessor`](crate::EventProcessor); always dead-letters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{category} failure: {message}")]
pub struct ProcessError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ProcessError {
    pub fn mapping(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Mapping,
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Persistence,
            message: message.into(),
        }
    }
}

impl From<DecodeError> for ProcessError {
    fn from(err: DecodeError) -> Self {
        Self {
            category: err.category(),
            message: err.to_string(),
        }
    }
}

/// Transport-level failures talking to RabbitMQ.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Topology declaration failed for '{name}': {source}")]
    Topology {
        name: String,
        #[source]
        source: lapin::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Publish to '{exchange}' with key '{routing_key}' was negatively acknowledged")]
    Nacked {
        exchange: String,
        routing_key: String,
    },

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("Publisher queue is full")]
    QueueFull,

    #[error("Publisher is closed")]
    Closed,
}

impl BrokerError {
    pub fn topology(name: impl Into<String>, source: lapin::Error) -> Self {
        BrokerError::Topology {
            name: name.into(),
            source,
        }
    }
}

impl From<deadpool_lapin::PoolError> for BrokerError {
    fn from(err: deadpool_lapin::PoolError) -> Self {
        BrokerError::Pool(err.to_string())
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Serialization(err.to_string())
    }
}
