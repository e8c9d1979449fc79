use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, patch},
};
use axum_helpers::{UuidPath, ValidatedJson};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::NotificationResult;
use crate::models::{
    CreateNotification, ListNotificationsQuery, Notification, NotificationPage,
    NotificationType, UnreadCount, UpdateNotification, UserQuery,
};
use crate::repository::NotificationRepository;
use crate::service::NotificationService;

pub const NOTIFICATIONS_PATH: &str = "/api/notifications";

/// OpenAPI documentation for the notification query API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_notifications,
        list_unread,
        unread_count,
        get_notification,
        create_notification,
        mark_as_read,
        update_notification,
        delete_notification,
    ),
    components(schemas(
        Notification,
        NotificationPage,
        NotificationType,
        CreateNotification,
        UpdateNotification,
        UnreadCount
    )),
    tags((name = "notifications", description = "Per-user notification inbox"))
)]
pub struct ApiDoc;

/// Routes mounted under [`NOTIFICATIONS_PATH`]
pub fn router<R: NotificationRepository + 'static>(service: NotificationService<R>) -> Router {
    let routes = Router::new()
        .route(
            "/",
            get(list_notifications::<R>).post(create_notification::<R>),
        )
        .route("/unread", get(list_unread::<R>))
        .route("/unread-count", get(unread_count::<R>))
        .route(
            "/{id}",
            get(get_notification::<R>)
                .put(update_notification::<R>)
                .delete(delete_notification::<R>),
        )
        .route("/{id}/read", patch(mark_as_read::<R>))
        .with_state(service);

    Router::new().nest(NOTIFICATIONS_PATH, routes)
}

/// A user's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "notifications",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "One page of notifications", body = NotificationPage),
        (status = 400, description = "Missing or invalid query parameters"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_notifications<R: NotificationRepository>(
    State(service): State<NotificationService<R>>,
    Query(query): Query<ListNotificationsQuery>,
) -> NotificationResult<Json<NotificationPage>> {
    let page = service
        .list_by_user(query.user_id, query.is_read, query.page, query.size)
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread",
    tag = "notifications",
    params(UserQuery),
    responses(
        (status = 200, description = "All unread notifications", body = Vec<Notification>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_unread<R: NotificationRepository>(
    State(service): State<NotificationService<R>>,
    Query(query): Query<UserQuery>,
) -> NotificationResult<Json<Vec<Notification>>> {
    let notifications = service.list_unread_by_user(query.user_id).await?;
    Ok(Json(notifications))
}

/// Badge count
#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    tag = "notifications",
    params(UserQuery),
    responses(
        (status = 200, description = "Number of unread notifications", body = UnreadCount),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn unread_count<R: NotificationRepository>(
    State(service): State<NotificationService<R>>,
    Query(query): Query<UserQuery>,
) -> NotificationResult<Json<UnreadCount>> {
    let count = service.count_unread_by_user(query.user_id).await?;
    Ok(Json(UnreadCount { count }))
}

#[utoipa::path(
    get,
    path = "/api/notifications/{id}",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification found", body = Notification),
        (status = 400, description = "Invalid notification ID"),
        (status = 404, description = "Notification not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_notification<R: NotificationRepository>(
    State(service): State<NotificationService<R>>,
    UuidPath(id): UuidPath,
) -> NotificationResult<Json<Notification>> {
    let notification = service.get_notification(id).await?;
    Ok(Json(notification))
}

#[utoipa::path(
    post,
    path = "/api/notifications",
    tag = "notifications",
    request_body = CreateNotification,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_notification<R: NotificationRepository>(
    State(service): State<NotificationService<R>>,
    ValidatedJson(input): ValidatedJson<CreateNotification>,
) -> NotificationResult<impl IntoResponse> {
    let notification = service.create_notification(input).await?;
    let location = format!("{NOTIFICATIONS_PATH}/{}", notification.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(notification),
    ))
}

/// Mark as read; a second call answers 409
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as read", body = Notification),
        (status = 404, description = "Notification not found"),
        (status = 409, description = "Notification already read"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mark_as_read<R: NotificationRepository>(
    State(service): State<NotificationService<R>>,
    UuidPath(id): UuidPath,
) -> NotificationResult<Json<Notification>> {
    let notification = service.mark_as_read(id).await?;
    Ok(Json(notification))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    request_body = UpdateNotification,
    responses(
        (status = 200, description = "Notification updated", body = Notification),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Notification not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_notification<R: NotificationRepository>(
    State(service): State<NotificationService<R>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateNotification>,
) -> NotificationResult<Json<Notification>> {
    let notification = service.update_notification(id, input).await?;
    Ok(Json(notification))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_notification<R: NotificationRepository>(
    State(service): State<NotificationService<R>>,
    UuidPath(id): UuidPath,
) -> NotificationResult<StatusCode> {
    service.delete_notification(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
