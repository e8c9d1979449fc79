//! Discriminator-driven decoding of incoming events.
//!
//! Bodies are parsed leniently first so that a syntactically valid body with
//! a missing or blank field is reported as a mapping problem, distinct from
//! a body that is not JSON of the expected shape at all.

use amqp_worker::{DecodeError, EventRegistry};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{AnswerCreatedEvent, DomainEvent, EventType};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerCreatedBody {
    event_type: Option<EventType>,
    actor_id: Option<Uuid>,
    user_id: Option<Uuid>,
    timestamp: Option<DateTime<Utc>>,
    question_id: Option<i64>,
    question_title: Option<String>,
    answer_id: Option<i64>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, DecodeError> {
    value.ok_or_else(|| {
        DecodeError::invalid(
            EventType::AnswerCreated.type_id(),
            format!("missing required field '{}'", field),
        )
    })
}

pub fn decode_answer_created(body: &[u8]) -> Result<AnswerCreatedEvent, DecodeError> {
    let type_id = EventType::AnswerCreated.type_id();
    let raw: AnswerCreatedBody =
        serde_json::from_slice(body).map_err(|e| DecodeError::malformed(type_id, e))?;

    if let Some(event_type) = raw.event_type
        && event_type != EventType::AnswerCreated
    {
        return Err(DecodeError::invalid(
            type_id,
            format!("body eventType {} disagrees with discriminator", event_type),
        ));
    }

    let question_title = required(raw.question_title, "questionTitle")?;
    if question_title.trim().is_empty() {
        return Err(DecodeError::invalid(type_id, "questionTitle is blank"));
    }

    Ok(AnswerCreatedEvent {
        event_type: EventType::AnswerCreated,
        actor_id: required(raw.actor_id, "actorId")?,
        user_id: required(raw.user_id, "userId")?,
        timestamp: raw.timestamp,
        question_id: required(raw.question_id, "questionId")?,
        question_title,
        answer_id: required(raw.answer_id, "answerId")?,
    })
}

fn decode_answer_created_event(body: &[u8]) -> Result<DomainEvent, DecodeError> {
    decode_answer_created(body).map(DomainEvent::AnswerCreated)
}

/// Registry of every [`DomainEvent`] decoder.
pub fn registry() -> EventRegistry<DomainEvent> {
    EventRegistry::new().register(
        EventType::AnswerCreated.type_id(),
        decode_answer_created_event,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqp_worker::ErrorCategory;
    use serde_json::json;

    fn valid_body() -> serde_json::Value {
        json!({
            "eventType": "ANSWER_CREATED",
            "actorId": "0192f5c4-1111-7000-8000-000000000001",
            "userId": "0192f5c4-2222-7000-8000-000000000002",
            "timestamp": "2025-03-01T10:15:30Z",
            "questionId": 42,
            "questionTitle": "How do I pin a future?",
            "answerId": 7
        })
    }

    fn bytes(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn test_decodes_valid_answer_created() {
        let event = registry()
            .decode(Some("answer_created"), &bytes(&valid_body()))
            .unwrap();

        let DomainEvent::AnswerCreated(event) = event;
        assert_eq!(event.question_id, 42);
        assert_eq!(event.answer_id, 7);
        assert_eq!(event.question_title, "How do I pin a future?");
        assert_eq!(
            event.user_id,
            Uuid::parse_str("0192f5c4-2222-7000-8000-000000000002").unwrap()
        );
        assert_eq!(
            event.timestamp.unwrap().to_rfc3339(),
            "2025-03-01T10:15:30+00:00"
        );
    }

    #[test]
    fn test_timestamp_and_event_type_are_optional() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("timestamp");
        body.as_object_mut().unwrap().remove("eventType");

        let event = decode_answer_created(&bytes(&body)).unwrap();
        assert_eq!(event.timestamp, None);
        assert_eq!(event.event_type, EventType::AnswerCreated);
    }

    #[test]
    fn test_missing_required_field_is_mapping_error() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("userId");

        let err = decode_answer_created(&bytes(&body)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Mapping);
        assert!(err.to_string().contains("userId"));
    }

    #[test]
    fn test_blank_title_is_mapping_error() {
        let mut body = valid_body();
        body["questionTitle"] = json!("   ");

        let err = decode_answer_created(&bytes(&body)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Mapping);
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let err = decode_answer_created(b"not json").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Decode);

        let mut body = valid_body();
        body["questionId"] = json!("forty-two");
        let err = decode_answer_created(&bytes(&body)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Decode);
    }

    #[test]
    fn test_unknown_discriminator_is_rejected() {
        let err = registry()
            .decode(Some("question_deleted"), &bytes(&valid_body()))
            .unwrap_err();
        assert_eq!(err, DecodeError::UnknownType("question_deleted".into()));
    }
}
