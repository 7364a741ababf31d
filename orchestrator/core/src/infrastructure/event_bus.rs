// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Orchestration Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Observers (CLI, audit logging, metrics sinks) subscribe; the orchestrator
// publishes without waiting on them. Events are not persisted.

use crate::domain::events::OrchestrationEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to orchestration events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<OrchestrationEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: OrchestrationEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is listening
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all orchestration events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all orchestration events
pub struct EventReceiver {
    receiver: broadcast::Receiver<OrchestrationEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::Stage;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let request_id = Uuid::new_v4();
        event_bus.publish(OrchestrationEvent::AttemptFailed {
            request_id,
            provider: "gemini".to_string(),
            reason: "Rate limit exceeded".to_string(),
            failed_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            OrchestrationEvent::AttemptFailed { provider, .. } => assert_eq!(provider, "gemini"),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_buffered_events_drain_in_order() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let request_id = Uuid::new_v4();

        event_bus.publish(OrchestrationEvent::StageCompleted {
            request_id,
            stage: Stage::Validation,
            provider: "anthropic".to_string(),
            applied: true,
            completed_at: Utc::now(),
        });
        event_bus.publish(OrchestrationEvent::Degraded {
            request_id,
            degraded_at: Utc::now(),
        });

        let first = receiver.try_recv().unwrap();
        assert_eq!(first.request_id(), request_id);
        assert!(matches!(
            first,
            OrchestrationEvent::StageCompleted {
                stage: Stage::Validation,
                ..
            }
        ));
        assert!(matches!(
            receiver.try_recv(),
            Ok(OrchestrationEvent::Degraded { .. })
        ));
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(OrchestrationEvent::Degraded {
            request_id: Uuid::new_v4(),
            degraded_at: Utc::now(),
        });

        // Both receivers should get the event
        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }

    #[test]
    fn test_try_recv_empty() {
        let event_bus = EventBus::default();
        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(4);
        event_bus.publish(OrchestrationEvent::Degraded {
            request_id: Uuid::new_v4(),
            degraded_at: Utc::now(),
        });
        assert_eq!(event_bus.subscriber_count(), 0);
    }
}
