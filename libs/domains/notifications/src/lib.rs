//! Notifications Domain
//!
//! Stores per-user notifications, fills the store from consumed domain
//! events and prunes it on a schedule.
//!
//! # Architecture
//!
//! ```text
//!  broker ──► NotificationProcessor ──► mapper ─┐
//!                                               ▼
//!  HTTP   ──► handlers ──────────────────► NotificationService ──► NotificationRepository
//!                                               ▲                    (PgNotificationRepository)
//!  cron   ──► RetentionSweeper ─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_notifications::{NotificationService, PgNotificationRepository};
//! use sea_orm::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("postgres://...").await?;
//! let service = NotificationService::new(PgNotificationRepository::new(db));
//! let unread = service.count_unread_by_user(uuid::Uuid::nil()).await?;
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod error;
pub mod handlers;
pub mod mapper;
pub mod models;
pub mod postgres;
pub mod processor;
pub mod repository;
pub mod retention;
pub mod service;
pub mod topology;

pub use error::{NotificationError, NotificationResult};
pub use handlers::{ApiDoc, NOTIFICATIONS_PATH, router};
pub use models::{
    CreateNotification, Notification, NotificationPage, NotificationType, PageRequest,
    UnreadCount, UpdateNotification,
};
pub use postgres::PgNotificationRepository;
pub use processor::NotificationProcessor;
pub use repository::NotificationRepository;
pub use retention::{RetentionConfig, RetentionSweeper, SweepOutcome};
pub use service::NotificationService;
pub use topology::NotificationsTopology;
