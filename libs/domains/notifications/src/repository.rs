use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::NotificationResult;
use crate::models::{CreateNotification, Notification, PageRequest};

/// Repository trait for Notification persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, input: CreateNotification) -> NotificationResult<Notification>;

    async fn get_by_id(&self, id: Uuid) -> NotificationResult<Option<Notification>>;

    /// One page of `user_id`'s notifications ordered by `created_at` descending,
    /// plus the total number matching the filter
    async fn list_by_user(
        &self,
        user_id: Uuid,
        is_read: Option<bool>,
        page: PageRequest,
    ) -> NotificationResult<(Vec<Notification>, u64)>;

    async fn list_unread_by_user(&self, user_id: Uuid) -> NotificationResult<Vec<Notification>>;

    /// Same predicate as [`list_unread_by_user`](Self::list_unread_by_user)
    async fn count_unread_by_user(&self, user_id: Uuid) -> NotificationResult<u64>;

    /// Flip an unread notification to read in one conditional write.
    ///
    /// Returns `None` when no unread notification with `id` exists.
    async fn mark_as_read(
        &self,
        id: Uuid,
        read_at: DateTime<Utc>,
    ) -> NotificationResult<Option<Notification>>;

    /// Overwrite an existing record
    async fn save(&self, notification: Notification) -> NotificationResult<Notification>;

    /// Returns whether a row was deleted
    async fn delete(&self, id: Uuid) -> NotificationResult<bool>;

    /// Delete everything created strictly before `cutoff`; returns the row count
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> NotificationResult<u64>;
}
