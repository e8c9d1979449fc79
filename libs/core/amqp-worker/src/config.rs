//! Consumer worker configuration

use core_config::amqp::AmqpConfig;
use std::time::Duration;

use crate::topology::Topology;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue to consume from
    pub queue: String,

    /// Consumer tag prefix; each consumer appends `-{index}`
    pub consumer_tag: String,

    /// Unacknowledged deliveries per consumer
    pub prefetch: u16,

    /// Number of independent consumers
    pub consumers: usize,

    /// First reconnect delay after a channel failure
    pub reconnect_initial: Duration,

    /// Upper bound for the reconnect delay
    pub reconnect_max: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: String::new(),
            consumer_tag: "amqp-worker".to_string(),
            prefetch: 1,
            consumers: 1,
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            ..Default::default()
        }
    }

    pub fn for_topology(topology: &Topology) -> Self {
        Self::new(topology.queue.clone())
    }

    /// Take prefetch and consumer count from the environment-driven config
    pub fn with_amqp_config(mut self, config: &AmqpConfig) -> Self {
        self.prefetch = config.prefetch;
        self.consumers = config.consumers;
        self
    }

    pub fn with_consumer_tag(mut self, tag: impl Into<String>) -> Self {
        self.consumer_tag = tag.into();
        self
    }

    pub fn with_prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = prefetch.max(1);
        self
    }

    pub fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers.max(1);
        self
    }

    pub fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial = initial;
        self.reconnect_max = max.max(initial);
        self
    }

    /// Delay before reconnect attempt number `attempt` (0-based), doubling up to the cap
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.reconnect_initial
            .saturating_mul(factor)
            .min(self.reconnect_max)
    }

    pub fn consumer_tag_for(&self, index: usize) -> String {
        format!("{}-{}", self.consumer_tag, index)
    }
}
