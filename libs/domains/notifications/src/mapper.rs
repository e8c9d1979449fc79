//! Domain event → notification content.

use chrono::{DateTime, Utc};
use domain_events::{AnswerCreatedEvent, DomainEvent};
use serde_json::json;

use crate::models::{CreateNotification, NotificationType};

pub const ANSWER_CREATED_TITLE: &str = "New answer to your question";

/// Build the notification for `event`.
///
/// `now` is used only when the event carries no timestamp.
pub fn to_notification(event: &DomainEvent, now: DateTime<Utc>) -> CreateNotification {
    match event {
        DomainEvent::AnswerCreated(e) => answer_created(e, now),
    }
}

fn answer_created(event: &AnswerCreatedEvent, now: DateTime<Utc>) -> CreateNotification {
    CreateNotification {
        user_id: event.user_id,
        actor_id: Some(event.actor_id),
        notification_type: NotificationType::from(event.event_type),
        title: ANSWER_CREATED_TITLE.to_string(),
        message: format!(
            "Your question \"{}\" received a new answer",
            event.question_title
        ),
        related_content_id: Some(event.answer_id.to_string()),
        related_data: Some(json!({
            "questionId": event.question_id,
            "answerId": event.answer_id,
            "questionTitle": event.question_title,
        })),
        created_at: Some(event.timestamp.unwrap_or(now)),
    }
}
