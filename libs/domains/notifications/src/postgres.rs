use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    entity,
    error::{NotificationError, NotificationResult},
    models::{CreateNotification, Notification, PageRequest},
    repository::NotificationRepository,
};

#[derive(Clone)]
pub struct PgNotificationRepository {
    db: DatabaseConnection,
}

impl PgNotificationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, input: CreateNotification) -> NotificationResult<Notification> {
        let active_model: entity::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        tracing::debug!(
            notification_id = %model.id,
            user_id = %model.user_id,
            "Inserted notification"
        );
        Ok(model.into())
    }

    async fn get_by_id(&self, id: Uuid) -> NotificationResult<Option<Notification>> {
        let model = entity::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        is_read: Option<bool>,
        page: PageRequest,
    ) -> NotificationResult<(Vec<Notification>, u64)> {
        let mut query = entity::Entity::find().filter(entity::Column::UserId.eq(user_id));
        if let Some(is_read) = is_read {
            query = query.filter(entity::Column::IsRead.eq(is_read));
        }

        let total = query.clone().count(&self.db).await?;

        // Id breaks ties between equal timestamps so pages stay disjoint
        let models = query
            .order_by_desc(entity::Column::CreatedAt)
            .order_by_desc(entity::Column::Id)
            .limit(page.size)
            .offset(page.offset())
            .all(&self.db)
            .await?;

        Ok((models.into_iter().map(Into::into).collect(), total))
    }

    async fn list_unread_by_user(&self, user_id: Uuid) -> NotificationResult<Vec<Notification>> {
        let models = entity::Entity::find()
            .filter(entity::Column::UserId.eq(user_id))
            .filter(entity::Column::IsRead.eq(false))
            .order_by_desc(entity::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn count_unread_by_user(&self, user_id: Uuid) -> NotificationResult<u64> {
        let count = entity::Entity::find()
            .filter(entity::Column::UserId.eq(user_id))
            .filter(entity::Column::IsRead.eq(false))
            .count(&self.db)
            .await?;

        Ok(count)
    }

    async fn mark_as_read(
        &self,
        id: Uuid,
        read_at: DateTime<Utc>,
    ) -> NotificationResult<Option<Notification>> {
        let result = entity::Entity::update_many()
            .col_expr(entity::Column::IsRead, Expr::value(true))
            .col_expr(entity::Column::ReadAt, Expr::value(read_at))
            .col_expr(entity::Column::UpdatedAt, Expr::value(read_at))
            .filter(entity::Column::Id.eq(id))
            .filter(entity::Column::IsRead.eq(false))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    async fn save(&self, notification: Notification) -> NotificationResult<Notification> {
        let id = notification.id;
        let active_model: entity::ActiveModel = notification.into();
        match active_model.update(&self.db).await {
            Ok(model) => Ok(model.into()),
            // Deleted between read and write
            Err(DbErr::RecordNotUpdated) => Err(NotificationError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: Uuid) -> NotificationResult<bool> {
        let result = entity::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> NotificationResult<u64> {
        let result = entity::Entity::delete_many()
            .filter(entity::Column::CreatedAt.lt(cutoff))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }
}
