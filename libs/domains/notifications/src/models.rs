use chrono::{DateTime, Utc};
use domain_events::EventType;
use sea_orm::sea_query::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Highest page whose offset still fits a Postgres `BIGINT`
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_SIZE;

/// Notification kind; one per domain event type
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    #[sea_orm(string_value = "ANSWER_CREATED")]
    AnswerCreated,
}

impl From<EventType> for NotificationType {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::AnswerCreated => NotificationType::AnswerCreated,
        }
    }
}

/// Notification entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    /// Recipient
    pub user_id: Uuid,
    /// Who triggered it, if anyone
    pub actor_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_content_id: Option<String>,
    /// Identifiers for deep-linking, shaped by `type`
    #[schema(value_type = Option<Object>)]
    pub related_data: Option<serde_json::Value>,
    pub is_read: bool,
    /// Set only while `is_read` is true
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Mark as read at `now`; returns false when it already was.
    pub fn mark_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Apply the set fields of `update`.
    ///
    /// `is_read = false` clears `read_at`; `is_read = true` on an unread
    /// record stamps it.
    pub fn apply_update(&mut self, update: UpdateNotification, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(notification_type) = update.notification_type {
            self.notification_type = notification_type;
        }
        if let Some(related_content_id) = update.related_content_id {
            self.related_content_id = Some(related_content_id);
        }
        if let Some(related_data) = update.related_data {
            self.related_data = Some(related_data);
        }
        match update.is_read {
            Some(true) if !self.is_read => {
                self.is_read = true;
                self.read_at = Some(now);
            }
            Some(false) => {
                self.is_read = false;
                self.read_at = None;
            }
            _ => {}
        }
        self.updated_at = now;
    }
}

/// DTO for creating a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub actor_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[validate(length(max = 100))]
    pub related_content_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub related_data: Option<serde_json::Value>,
    /// Defaults to the time of insertion
    pub created_at: Option<DateTime<Utc>>,
}

/// DTO for a partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotification {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    #[validate(length(max = 100))]
    pub related_content_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub related_data: Option<serde_json::Value>,
    pub is_read: Option<bool>,
}

impl UpdateNotification {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.message.is_none()
            && self.notification_type.is_none()
            && self.related_content_id.is_none()
            && self.related_data.is_none()
            && self.is_read.is_none()
    }
}

/// Query parameters for the paginated list
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListNotificationsQuery {
    pub user_id: Uuid,
    /// Zero-based page number
    #[serde(default)]
    pub page: u64,
    /// Page size, clamped to 1..=100
    #[serde(default = "default_page_size")]
    pub size: u64,
    /// Only read (true) or unread (false) notifications
    pub is_read: Option<bool>,
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub user_id: Uuid,
}

/// Page position and size after clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }
}

/// One page of a user's notifications, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub data: Vec<Notification>,
    pub current_page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl NotificationPage {
    pub fn new(data: Vec<Notification>, request: PageRequest, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(request.size);
        Self {
            data,
            current_page: request.page,
            page_size: request.size,
            total_pages,
            total_items,
            has_next: request.page.saturating_add(1) < total_pages,
            has_previous: request.page > 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UnreadCount {
    pub count: u64,
}
