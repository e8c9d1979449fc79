use amqp_worker::TopologyDef;
use domain_events::{DOMAIN_EVENTS_EXCHANGE, EventType};

/// Broker layout owned by the notifications service.
///
/// Producers only need [`DOMAIN_EVENTS_EXCHANGE`] and the routing keys.
pub struct NotificationsTopology;

impl TopologyDef for NotificationsTopology {
    const EXCHANGE: &'static str = DOMAIN_EVENTS_EXCHANGE;
    const QUEUE: &'static str = "notifications-service.queue";
    const ROUTING_KEYS: &'static [&'static str] = &["answer.created"];
    const DEAD_LETTER_EXCHANGE: &'static str = "question-events.dlx";
    const DEAD_LETTER_QUEUE: &'static str = "notification-service.dlx.queue";
    const DEAD_LETTER_ROUTING_KEY: &'static str = "dead-letter.notification-service";
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_event_type_is_bound() {
        for event_type in EventType::iter() {
            assert!(
                NotificationsTopology::ROUTING_KEYS.contains(&event_type.routing_key()),
                "{event_type} is not bound to the notifications queue"
            );
        }
    }
}
