use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{NotificationError, NotificationResult};
use crate::models::{
    CreateNotification, MAX_PAGE, Notification, NotificationPage, PageRequest,
    UpdateNotification,
};
use crate::repository::NotificationRepository;

/// Service layer for Notification business logic
pub struct NotificationService<R: NotificationRepository> {
    repository: Arc<R>,
}

impl<R: NotificationRepository> Clone for NotificationService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id, notification_type = %input.notification_type))]
    pub async fn create_notification(
        &self,
        input: CreateNotification,
    ) -> NotificationResult<Notification> {
        input.validate()?;

        let notification = self.repository.create(input).await?;
        info!(notification_id = %notification.id, "Created notification");
        Ok(notification)
    }

    #[instrument(skip(self))]
    pub async fn get_notification(&self, id: Uuid) -> NotificationResult<Notification> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(NotificationError::NotFound(id))
    }

    /// Newest first; `size` is clamped to 1..=100
    #[instrument(skip(self))]
    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        is_read: Option<bool>,
        page: u64,
        size: u64,
    ) -> NotificationResult<NotificationPage> {
        if page > MAX_PAGE {
            return Err(NotificationError::Validation(format!(
                "page must be at most {MAX_PAGE}"
            )));
        }
        let request = PageRequest::new(page, size);
        let (data, total) = self
            .repository
            .list_by_user(user_id, is_read, request)
            .await?;
        Ok(NotificationPage::new(data, request, total))
    }

    #[instrument(skip(self))]
    pub async fn list_unread_by_user(&self, user_id: Uuid) -> NotificationResult<Vec<Notification>> {
        self.repository.list_unread_by_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn count_unread_by_user(&self, user_id: Uuid) -> NotificationResult<u64> {
        self.repository.count_unread_by_user(user_id).await
    }

    /// Unread → read. A second call is declined with `AlreadyRead`.
    #[instrument(skip(self))]
    pub async fn mark_as_read(&self, id: Uuid) -> NotificationResult<Notification> {
        if let Some(notification) = self.repository.mark_as_read(id, Utc::now()).await? {
            info!("Marked notification as read");
            return Ok(notification);
        }

        match self.repository.get_by_id(id).await? {
            Some(_) => Err(NotificationError::AlreadyRead(id)),
            None => Err(NotificationError::NotFound(id)),
        }
    }

    #[instrument(skip(self, input))]
    pub async fn update_notification(
        &self,
        id: Uuid,
        input: UpdateNotification,
    ) -> NotificationResult<Notification> {
        input.validate()?;

        let mut notification = self.get_notification(id).await?;
        if input.is_empty() {
            warn!("Update without any fields, returning notification unchanged");
            return Ok(notification);
        }

        notification.apply_update(input, Utc::now());
        let notification = self.repository.save(notification).await?;
        info!("Updated notification");
        Ok(notification)
    }

    #[instrument(skip(self))]
    pub async fn delete_notification(&self, id: Uuid) -> NotificationResult<()> {
        if !self.repository.delete(id).await? {
            return Err(NotificationError::NotFound(id));
        }
        info!("Deleted notification");
        Ok(())
    }

    /// Bulk delete for retention; returns the number of rows removed
    #[instrument(skip(self))]
    pub async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> NotificationResult<u64> {
        self.repository.delete_created_before(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationType;
    use crate::repository::MockNotificationRepository;
    use mockall::predicate::eq;

    fn notification(id: Uuid, is_read: bool) -> Notification {
        let now = Utc::now();
        Notification {
            id,
            user_id: Uuid::now_v7(),
            actor_id: Some(Uuid::now_v7()),
            notification_type: NotificationType::AnswerCreated,
            title: "New answer to your question".into(),
            message: "Your question \"Borrowck\" received a new answer".into(),
            related_content_id: Some("9".into()),
            related_data: None,
            is_read,
            read_at: is_read.then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    fn create_input() -> CreateNotification {
        CreateNotification {
            user_id: Uuid::now_v7(),
            actor_id: None,
            notification_type: NotificationType::AnswerCreated,
            title: "New answer to your question".into(),
            message: "m".into(),
            related_content_id: None,
            related_data: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input_without_touching_store() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_create().never();
        let service = NotificationService::new(repo);

        let result = service
            .create_notification(CreateNotification {
                title: "x".repeat(256),
                ..create_input()
            })
            .await;

        assert!(matches!(result, Err(NotificationError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_persists() {
        let id = Uuid::now_v7();
        let mut repo = MockNotificationRepository::new();
        repo.expect_create()
            .times(1)
            .returning(move |_| Ok(notification(id, false)));
        let service = NotificationService::new(repo);

        let created = service.create_notification(create_input()).await.unwrap();
        assert_eq!(created.id, id);
        assert!(!created.is_read);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let id = Uuid::now_v7();
        let mut repo = MockNotificationRepository::new();
        repo.expect_get_by_id().with(eq(id)).returning(|_| Ok(None));
        let service = NotificationService::new(repo);

        assert!(matches!(
            service.get_notification(id).await,
            Err(NotificationError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_mark_as_read_twice_is_declined() {
        let id = Uuid::now_v7();
        let mut repo = MockNotificationRepository::new();
        let mut calls = 0;
        repo.expect_mark_as_read().times(2).returning(move |id, _| {
            calls += 1;
            Ok((calls == 1).then(|| notification(id, true)))
        });
        repo.expect_get_by_id()
            .times(1)
            .returning(|id| Ok(Some(notification(id, true))));
        let service = NotificationService::new(repo);

        let first = service.mark_as_read(id).await.unwrap();
        assert!(first.is_read);
        assert!(first.read_at.is_some());

        assert!(matches!(
            service.mark_as_read(id).await,
            Err(NotificationError::AlreadyRead(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_as_read_missing_is_not_found() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_mark_as_read().returning(|_, _| Ok(None));
        repo.expect_get_by_id().returning(|_| Ok(None));
        let service = NotificationService::new(repo);

        assert!(matches!(
            service.mark_as_read(Uuid::now_v7()).await,
            Err(NotificationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_update_returns_current_without_saving() {
        let id = Uuid::now_v7();
        let mut repo = MockNotificationRepository::new();
        repo.expect_get_by_id()
            .returning(|id| Ok(Some(notification(id, true))));
        repo.expect_save().never();
        let service = NotificationService::new(repo);

        let unchanged = service
            .update_notification(id, UpdateNotification::default())
            .await
            .unwrap();
        assert!(unchanged.is_read);
    }

    #[tokio::test]
    async fn test_update_unread_clears_read_at() {
        let id = Uuid::now_v7();
        let mut repo = MockNotificationRepository::new();
        repo.expect_get_by_id()
            .returning(|id| Ok(Some(notification(id, true))));
        repo.expect_save()
            .withf(|n| !n.is_read && n.read_at.is_none())
            .times(1)
            .returning(Ok);
        let service = NotificationService::new(repo);

        let updated = service
            .update_notification(
                id,
                UpdateNotification {
                    is_read: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_read);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_delete().returning(|_| Ok(false));
        let service = NotificationService::new(repo);

        assert!(matches!(
            service.delete_notification(Uuid::now_v7()).await,
            Err(NotificationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_clamps_page_size() {
        let user_id = Uuid::now_v7();
        let mut repo = MockNotificationRepository::new();
        repo.expect_list_by_user()
            .withf(move |u, is_read, page| *u == user_id && is_read.is_none() && page.size == 100)
            .returning(|_, _, _| Ok((vec![], 250)));
        let service = NotificationService::new(repo);

        let page = service.list_by_user(user_id, None, 1, 5_000).await.unwrap();
        assert_eq!(page.page_size, 100);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_previous);
    }

    #[tokio::test]
    async fn test_list_rejects_page_beyond_offset_range() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_list_by_user().never();
        let service = NotificationService::new(repo);

        let result = service
            .list_by_user(Uuid::now_v7(), None, u64::MAX, 20)
            .await;
        assert!(matches!(result, Err(NotificationError::Validation(_))));
    }
}
