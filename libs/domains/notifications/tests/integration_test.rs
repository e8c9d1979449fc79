//! Integration tests for the Notifications domain
//!
//! These run against real PostgreSQL via testcontainers and cover what mocks
//! cannot: ordering and paging in SQL, the conditional mark-as-read write and
//! the retention cutoff.

use chrono::{Duration, Utc};
use domain_events::AnswerCreatedEvent;
use domain_notifications::*;
use std::collections::HashSet;
use test_utils::{TestDataBuilder, TestDatabase, assertions::*};
use uuid::Uuid;

fn input(user_id: Uuid, title: &str) -> CreateNotification {
    CreateNotification {
        user_id,
        actor_id: None,
        notification_type: NotificationType::AnswerCreated,
        title: title.to_string(),
        message: format!("message for {title}"),
        related_content_id: None,
        related_data: None,
        created_at: None,
    }
}

// ============================================================================
// Repository Tests
// ============================================================================

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_create_and_get_notification() {
    let db = TestDatabase::new().await;
    let repo = PgNotificationRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("create_and_get");

    let created = repo
        .create(CreateNotification {
            related_data: Some(serde_json::json!({"questionId": 1, "answerId": 2})),
            ..input(builder.user_id(), "first")
        })
        .await
        .unwrap();

    assert!(!created.is_read);
    assert!(created.read_at.is_none());
    assert_eq!(created.notification_type, NotificationType::AnswerCreated);

    let fetched = assert_some(repo.get_by_id(created.id).await.unwrap(), "stored");
    assert_uuid_eq(fetched.user_id, builder.user_id(), "recipient");
    assert_eq!(fetched.related_data, created.related_data);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pages_are_disjoint_and_ordered() {
    let db = TestDatabase::new().await;
    let service = NotificationService::new(PgNotificationRepository::new(db.connection()));
    let builder = TestDataBuilder::from_test_name("pagination");
    let user_id = builder.user_id();
    let base = Utc::now() - Duration::hours(1);

    for i in 0..30 {
        service
            .create_notification(CreateNotification {
                created_at: Some(base + Duration::seconds(i)),
                ..input(user_id, &format!("n{i}"))
            })
            .await
            .unwrap();
    }
    // Someone else's notification never shows up
    service
        .create_notification(input(builder.actor_id(), "other"))
        .await
        .unwrap();

    let first = service.list_by_user(user_id, None, 0, 20).await.unwrap();
    let second = service.list_by_user(user_id, None, 1, 20).await.unwrap();

    assert_eq!(first.total_items, 30);
    assert_eq!(first.total_pages, 2);
    assert!(first.has_next && !first.has_previous);
    assert!(!second.has_next && second.has_previous);
    assert_eq!(first.data.len(), 20);
    assert_eq!(second.data.len(), 10);

    let all: Vec<_> = first.data.iter().chain(second.data.iter()).collect();
    let ids: HashSet<_> = all.iter().map(|n| n.id).collect();
    assert_eq!(ids.len(), 30);
    assert!(
        all.windows(2).all(|w| w[0].created_at >= w[1].created_at),
        "pages must be ordered newest first"
    );
    assert_eq!(all[0].title, "n29");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unread_count_matches_unread_list() {
    let db = TestDatabase::new().await;
    let service = NotificationService::new(PgNotificationRepository::new(db.connection()));
    let user_id = TestDataBuilder::from_test_name("unread").user_id();

    let mut ids = Vec::new();
    for i in 0..4 {
        let n = service
            .create_notification(input(user_id, &format!("u{i}")))
            .await
            .unwrap();
        ids.push(n.id);
    }
    service.mark_as_read(ids[0]).await.unwrap();

    let unread = service.list_unread_by_user(user_id).await.unwrap();
    let count = service.count_unread_by_user(user_id).await.unwrap();
    assert_eq!(unread.len() as u64, count);
    assert_eq!(count, 3);

    let read_only = service
        .list_by_user(user_id, Some(true), 0, 20)
        .await
        .unwrap();
    assert_eq!(read_only.total_items, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_mark_as_read_twice() {
    let db = TestDatabase::new().await;
    let service = NotificationService::new(PgNotificationRepository::new(db.connection()));
    let user_id = TestDataBuilder::from_test_name("mark_twice").user_id();

    let created = service
        .create_notification(input(user_id, "read me"))
        .await
        .unwrap();

    let read = service.mark_as_read(created.id).await.unwrap();
    assert!(read.is_read);
    assert!(read.read_at.is_some());

    let again = service.mark_as_read(created.id).await;
    assert!(
        matches!(again, Err(NotificationError::AlreadyRead(id)) if id == created.id),
        "Expected AlreadyRead, got {:?}",
        again
    );

    let missing = service.mark_as_read(Uuid::now_v7()).await;
    assert!(matches!(missing, Err(NotificationError::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_update_back_to_unread_and_delete() {
    let db = TestDatabase::new().await;
    let service = NotificationService::new(PgNotificationRepository::new(db.connection()));
    let user_id = TestDataBuilder::from_test_name("update_delete").user_id();

    let created = service
        .create_notification(input(user_id, "edit me"))
        .await
        .unwrap();
    service.mark_as_read(created.id).await.unwrap();

    let updated = service
        .update_notification(
            created.id,
            UpdateNotification {
                title: Some("edited".into()),
                is_read: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "edited");
    assert!(!updated.is_read);
    assert!(updated.read_at.is_none());
    assert!(updated.updated_at >= created.updated_at);

    service.delete_notification(created.id).await.unwrap();
    assert!(matches!(
        service.delete_notification(created.id).await,
        Err(NotificationError::NotFound(_))
    ));
}

// ============================================================================
// Consumer and Retention Tests
// ============================================================================

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_processor_stores_answer_notification() {
    use amqp_worker::{EventProcessor, IncomingMessage};

    let db = TestDatabase::new().await;
    let service = NotificationService::new(PgNotificationRepository::new(db.connection()));
    let processor = NotificationProcessor::new(service.clone());
    let builder = TestDataBuilder::from_test_name("processor");

    let event = AnswerCreatedEvent::new(
        builder.actor_id(),
        builder.user_id(),
        builder.numeric_id(0),
        builder.text("question"),
        builder.numeric_id(1),
    );
    let message = IncomingMessage::new(Some("answer_created"), "answer.created", Vec::new());
    processor.process(event.clone().into(), &message).await.unwrap();

    let unread = service.list_unread_by_user(builder.user_id()).await.unwrap();
    assert_eq!(unread.len(), 1);
    let stored = &unread[0];
    assert_eq!(stored.notification_type, NotificationType::AnswerCreated);
    assert_eq!(stored.actor_id, Some(builder.actor_id()));
    assert!(stored.message.contains(&builder.text("question")));
    assert_eq!(
        stored.related_data.as_ref().map(|d| d["answerId"].clone()),
        Some(serde_json::json!(event.answer_id))
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_retention_boundary() {
    let db = TestDatabase::new().await;
    let service = NotificationService::new(PgNotificationRepository::new(db.connection()));
    let user_id = TestDataBuilder::from_test_name("retention").user_id();
    let now = Utc::now();

    let old = service
        .create_notification(CreateNotification {
            created_at: Some(now - Duration::days(31)),
            ..input(user_id, "old")
        })
        .await
        .unwrap();
    let recent = service
        .create_notification(CreateNotification {
            created_at: Some(now - Duration::days(29)),
            ..input(user_id, "recent")
        })
        .await
        .unwrap();

    let sweeper = RetentionSweeper::new(service.clone(), RetentionConfig::default());
    let outcome = sweeper.run_once(now).await;
    assert!(matches!(outcome, SweepOutcome::Completed { deleted: 1, .. }));

    assert!(matches!(
        service.get_notification(old.id).await,
        Err(NotificationError::NotFound(_))
    ));
    service.get_notification(recent.id).await.unwrap();

    // Re-running deletes nothing further
    assert!(matches!(
        sweeper.run_once(now).await,
        SweepOutcome::Completed { deleted: 0, .. }
    ));
}
