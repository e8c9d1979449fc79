use amqp_worker::{EventProcessor, IncomingMessage, ProcessError};
use async_trait::async_trait;
use chrono::Utc;
use domain_events::DomainEvent;
use tracing::{info, instrument};

use crate::error::NotificationError;
use crate::mapper;
use crate::repository::NotificationRepository;
use crate::service::NotificationService;

/// Turns consumed domain events into stored notifications.
///
/// Content the store refuses (validation) counts as a mapping failure;
/// anything else the store returns is a persistence failure. Both
/// dead-letter the message.
pub struct NotificationProcessor<R: NotificationRepository> {
    service: NotificationService<R>,
}

impl<R: NotificationRepository> NotificationProcessor<R> {
    pub fn new(service: NotificationService<R>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<R> EventProcessor<DomainEvent> for NotificationProcessor<R>
where
    R: NotificationRepository + 'static,
{
    #[instrument(
        skip_all,
        fields(event_type = %event.event_type(), user_id = %event.user_id(), message_id = ?message.message_id)
    )]
    async fn process(
        &self,
        event: DomainEvent,
        message: &IncomingMessage,
    ) -> Result<(), ProcessError> {
        let input = mapper::to_notification(&event, Utc::now());

        let notification = self
            .service
            .create_notification(input)
            .await
            .map_err(|err| match err {
                NotificationError::Validation(msg) => ProcessError::mapping(msg),
                other => ProcessError::persistence(other.to_string()),
            })?;

        info!(notification_id = %notification.id, "Notification created from event");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "notification-processor"
    }
}
