//! Retention Sweeper
//!
//! Deletes notifications older than the retention window on a cron schedule.
//! Each run is one bulk delete keyed on `now - retention_days`, so a failed
//! or skipped run is simply caught up by the next one.
//!
//! | Variable | Default |
//! |---|---|
//! | `NOTIFICATION_CLEANUP_ENABLED` | `true` |
//! | `NOTIFICATION_CLEANUP_CRON` | `0 0 2 * * *` (daily 02:00, seconds field first) |
//! | `NOTIFICATION_RETENTION_DAYS` | `30` (1 to 36500) |

use chrono::{DateTime, Duration, Utc};
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};

use crate::repository::NotificationRepository;
use crate::service::NotificationService;

pub const DEFAULT_CLEANUP_CRON: &str = "0 0 2 * * *";
pub const DEFAULT_RETENTION_DAYS: i64 = 30;
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub cron: String,
    pub retention_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: DEFAULT_CLEANUP_CRON.to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RetentionConfig {
    /// `None` when `retention_days` does not fit a `Duration`
    pub fn retention(&self) -> Option<Duration> {
        Duration::try_days(self.retention_days)
    }
}

impl FromEnv for RetentionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let enabled = env_parse("NOTIFICATION_CLEANUP_ENABLED", true)?;
        let cron = env_or_default("NOTIFICATION_CLEANUP_CRON", DEFAULT_CLEANUP_CRON);
        let retention_days = env_parse("NOTIFICATION_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;

        if !(1..=MAX_RETENTION_DAYS).contains(&retention_days) {
            return Err(ConfigError::parse(
                "NOTIFICATION_RETENTION_DAYS",
                format!("must be between 1 and {MAX_RETENTION_DAYS}"),
            ));
        }
        if cron.trim().is_empty() {
            return Err(ConfigError::parse("NOTIFICATION_CLEANUP_CRON", "must not be empty"));
        }

        Ok(Self {
            enabled,
            cron,
            retention_days,
        })
    }
}

/// Result of one sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed { deleted: u64, cutoff: DateTime<Utc> },
    /// Another sweep was still running
    Skipped,
    Failed(String),
}

pub struct RetentionSweeper<R: NotificationRepository> {
    service: NotificationService<R>,
    config: RetentionConfig,
    running: AtomicBool,
}

/// Clears the run-in-progress flag however the sweep ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R> RetentionSweeper<R>
where
    R: NotificationRepository + 'static,
{
    pub fn new(service: NotificationService<R>, config: RetentionConfig) -> Self {
        Self {
            service,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Delete everything created before `now - retention_days`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> SweepOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Retention sweep already running, skipping");
            return SweepOutcome::Skipped;
        }
        let _guard = RunGuard(&self.running);

        let Some(cutoff) = self
            .config
            .retention()
            .and_then(|window| now.checked_sub_signed(window))
        else {
            error!(
                retention_days = self.config.retention_days,
                "Retention window out of range"
            );
            return SweepOutcome::Failed(format!(
                "retention window of {} days is out of range",
                self.config.retention_days
            ));
        };

        match self.service.delete_created_before(cutoff).await {
            Ok(deleted) => {
                metrics::counter!("notifications_swept_total").increment(deleted);
                info!(deleted, %cutoff, "Retention sweep complete");
                SweepOutcome::Completed { deleted, cutoff }
            }
            Err(e) => {
                error!(error = %e, %cutoff, "Retention sweep failed");
                SweepOutcome::Failed(e.to_string())
            }
        }
    }

    /// Schedule sweeps on the configured cron expression.
    ///
    /// Returns `None` without scheduling anything when the sweeper is
    /// disabled. The caller owns the scheduler and shuts it down.
    pub async fn start(self: Arc<Self>) -> Result<Option<JobScheduler>, JobSchedulerError> {
        if !self.config.enabled {
            info!("Retention sweeper disabled");
            return Ok(None);
        }

        let scheduler = JobScheduler::new().await?;
        let sweeper = Arc::clone(&self);
        let job = Job::new_async(self.config.cron.as_str(), move |_uuid, _lock| {
            let sweeper = Arc::clone(&sweeper);
            Box::pin(async move {
                sweeper.run_once(Utc::now()).await;
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!(
            cron = %self.config.cron,
            retention_days = self.config.retention_days,
            "Retention sweeper scheduled"
        );
        Ok(Some(scheduler))
    }
}
