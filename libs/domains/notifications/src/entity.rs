use crate::models::{CreateNotification, Notification, NotificationType};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sea-ORM Entity for the notifications table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub actor_id: Option<Uuid>,
    #[sea_orm(column_name = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_content_id: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub related_data: Option<Json>,
    pub is_read: bool,
    pub read_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Notification {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            actor_id: model.actor_id,
            notification_type: model.notification_type,
            title: model.title,
            message: model.message,
            related_content_id: model.related_content_id,
            related_data: model.related_data,
            is_read: model.is_read,
            read_at: model.read_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<CreateNotification> for ActiveModel {
    fn from(input: CreateNotification) -> Self {
        let now = chrono::Utc::now();
        ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(input.user_id),
            actor_id: Set(input.actor_id),
            notification_type: Set(input.notification_type),
            title: Set(input.title),
            message: Set(input.message),
            related_content_id: Set(input.related_content_id),
            related_data: Set(input.related_data),
            is_read: Set(false),
            read_at: Set(None),
            created_at: Set(input.created_at.unwrap_or(now).into()),
            updated_at: Set(now.into()),
        }
    }
}

/// Full overwrite of every mutable column
impl From<Notification> for ActiveModel {
    fn from(notification: Notification) -> Self {
        ActiveModel {
            id: Set(notification.id),
            user_id: Set(notification.user_id),
            actor_id: Set(notification.actor_id),
            notification_type: Set(notification.notification_type),
            title: Set(notification.title),
            message: Set(notification.message),
            related_content_id: Set(notification.related_content_id),
            related_data: Set(notification.related_data),
            is_read: Set(notification.is_read),
            read_at: Set(notification.read_at.map(Into::into)),
            created_at: Set(notification.created_at.into()),
            updated_at: Set(notification.updated_at.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_create_defaults() {
        let created_at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let active: ActiveModel = CreateNotification {
            user_id: Uuid::now_v7(),
            actor_id: None,
            notification_type: NotificationType::AnswerCreated,
            title: "t".into(),
            message: "m".into(),
            related_content_id: None,
            related_data: None,
            created_at: Some(created_at),
        }
        .into();

        assert_eq!(active.is_read, Set(false));
        assert_eq!(active.read_at, Set(None));
        assert_eq!(active.created_at, Set(created_at.into()));
    }
}
