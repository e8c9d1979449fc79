//! # Axum Helpers
//!
//! HTTP plumbing shared by the notification services.
//!
//! - **[`errors`]**: the JSON error envelope (`{code, error, message, details}`) and [`AppError`]
//! - **[`extractors`]**: [`ValidatedJson`] and [`UuidPath`]
//! - **[`server`]**: router assembly with OpenAPI JSON, request tracing, timeouts
//! - **[`shutdown`]**: SIGINT/SIGTERM handling fanned out over a `watch` channel

pub mod errors;
pub mod extractors;
pub mod server;
pub mod shutdown;

pub use errors::{AppError, ErrorCode, ErrorResponse};
pub use extractors::{UuidPath, ValidatedJson};
pub use server::{create_router, serve};
pub use shutdown::{ShutdownCoordinator, shutdown_signal};
