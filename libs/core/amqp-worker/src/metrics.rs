//! Prometheus metrics for consumers and publishers

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder once; later calls return the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    PROMETHEUS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics initialized");
        Ok(handle)
    })
}

pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Text exposition, empty until [`init_metrics`] ran
pub fn render_metrics() -> String {
    prometheus_handle().map(|h| h.render()).unwrap_or_default()
}

#[derive(Clone, Debug)]
pub struct ConsumerMetrics {
    queue: String,
}

impl ConsumerMetrics {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
        }
    }

    pub fn acked(&self, duration: Duration) {
        counter!(
            "amqp_messages_consumed_total",
            "queue" => self.queue.clone(),
            "outcome" => "ack"
        )
        .increment(1);

        histogram!(
            "amqp_message_processing_seconds",
            "queue" => self.queue.clone()
        )
        .record(duration.as_secs_f64());
    }

    pub fn dead_lettered(&self, category: &str) {
        counter!(
            "amqp_messages_consumed_total",
            "queue" => self.queue.clone(),
            "outcome" => "dead_letter"
        )
        .increment(1);

        counter!(
            "amqp_message_errors_total",
            "queue" => self.queue.clone(),
            "category" => category.to_string()
        )
        .increment(1);
    }

    pub fn redelivered(&self) {
        counter!(
            "amqp_messages_redelivered_total",
            "queue" => self.queue.clone()
        )
        .increment(1);
    }

    pub fn reconnected(&self) {
        counter!(
            "amqp_consumer_reconnects_total",
            "queue" => self.queue.clone()
        )
        .increment(1);
    }
}

#[derive(Clone, Debug, Default)]
pub struct PublisherMetrics;

impl PublisherMetrics {
    pub fn published(&self, exchange: &str, routing_key: &str) {
        self.record(exchange, routing_key, "ok");
    }

    pub fn failed(&self, exchange: &str, routing_key: &str) {
        self.record(exchange, routing_key, "error");
    }

    pub fn dropped(&self, exchange: &str, routing_key: &str) {
        self.record(exchange, routing_key, "dropped");
    }

    fn record(&self, exchange: &str, routing_key: &str, outcome: &'static str) {
        counter!(
            "amqp_messages_published_total",
            "exchange" => exchange.to_string(),
            "routing_key" => routing_key.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        let first = init_metrics().unwrap() as *const PrometheusHandle;
        let second = init_metrics().unwrap() as *const PrometheusHandle;
        assert_eq!(first, second);

        ConsumerMetrics::new("metrics-test.queue").acked(Duration::from_millis(5));
        assert!(render_metrics().contains("amqp_messages_consumed_total"));
    }
}
