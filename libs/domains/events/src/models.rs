//! Event payloads

use amqp_worker::OutboundEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of domain event, also the kind of notification it produces.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    AnswerCreated,
}

impl EventType {
    /// Value of the `__TypeId__` header
    pub fn type_id(&self) -> &'static str {
        match self {
            EventType::AnswerCreated => "answer_created",
        }
    }

    pub fn routing_key(&self) -> &'static str {
        match self {
            EventType::AnswerCreated => "answer.created",
        }
    }

    pub fn from_type_id(type_id: &str) -> Option<Self> {
        match type_id {
            "answer_created" => Some(EventType::AnswerCreated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Someone answered a question; the question's author is notified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCreatedEvent {
    pub event_type: EventType,
    /// Author of the answer
    pub actor_id: Uuid,
    /// Recipient: the author of the question
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub question_id: i64,
    pub question_title: String,
    pub answer_id: i64,
}

impl AnswerCreatedEvent {
    pub fn new(
        actor_id: Uuid,
        user_id: Uuid,
        question_id: i64,
        question_title: impl Into<String>,
        answer_id: i64,
    ) -> Self {
        Self {
            event_type: EventType::AnswerCreated,
            actor_id,
            user_id,
            timestamp: Some(Utc::now()),
            question_id,
            question_title: question_title.into(),
            answer_id,
        }
    }
}

impl OutboundEvent for AnswerCreatedEvent {
    fn type_id(&self) -> &'static str {
        self.event_type.type_id()
    }

    fn routing_key(&self) -> &'static str {
        self.event_type.routing_key()
    }
}

/// Every event this service understands, keyed by discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    AnswerCreated(AnswerCreatedEvent),
}

impl DomainEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            DomainEvent::AnswerCreated(_) => EventType::AnswerCreated,
        }
    }

    /// Recipient of the resulting notification
    pub fn user_id(&self) -> Uuid {
        match self {
            DomainEvent::AnswerCreated(e) => e.user_id,
        }
    }
}

impl From<AnswerCreatedEvent> for DomainEvent {
    fn from(event: AnswerCreatedEvent) -> Self {
        DomainEvent::AnswerCreated(event)
    }
}
