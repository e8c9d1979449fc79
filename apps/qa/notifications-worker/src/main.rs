//! Notifications Worker - Entry Point
//!
//! Turns domain events from RabbitMQ into stored notifications and serves
//! them over HTTP.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    notifications_worker::run().await
}
