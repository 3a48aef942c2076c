//! Domain event system — lets presentation layers watch the loop.
//!
//! The loop controller and dispatcher publish events as rounds progress.
//! Subscribers (a CLI spinner, a trace exporter) react without coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::plan::ExecutionMode;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A new round entered the Thinking state
    RoundStarted {
        session_id: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// The planner's first response was malformed and a corrective retry was sent
    PlannerRetried {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A plan was handed to the dispatcher
    PlanDispatched {
        session_id: String,
        mode: ExecutionMode,
        calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool call finished (successfully or not)
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The session reached a terminal state
    SessionFinished {
        session_id: String,
        outcome: String,
        iterations: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolExecuted {
            tool_name: "calculator".into(),
            success: true,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted { tool_name, success, .. } => {
                assert_eq!(tool_name, "calculator");
                assert!(success);
            }
            _ => panic!("Expected ToolExecuted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::SessionFinished {
            session_id: "s".into(),
            outcome: "failed".into(),
            iterations: 0,
            timestamp: Utc::now(),
        });
    }
}
