//! Runtime events: structured lifecycle markers recorded during a turn.
//!
//! Events are appended to the turn context and can also be fanned out
//! through an [`EventBus`] to live subscribers (logs, dashboards).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeEventType {
    TurnStarted,
    LlmStarted,
    LlmFinished,
    ToolStarted,
    ToolFinished,
    RetryStarted,
    RetryFinished,
    CompactionStarted,
    CompactionFinished,
    TurnFinished,
    TurnFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeEvent {
    #[serde(rename = "type")]
    pub event_type: RuntimeEventType,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub channel_type: String,
    pub chat_id: String,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// A broadcast-based event bus for runtime events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<RuntimeEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: RuntimeEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RuntimeEvent>> {
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

    fn event(event_type: RuntimeEventType) -> RuntimeEvent {
        RuntimeEvent {
            event_type,
            timestamp: Utc::now(),
            session_id: "s1".into(),
            channel_type: "cli".into(),
            chat_id: "local".into(),
            payload: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(event(RuntimeEventType::RetryStarted));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, RuntimeEventType::RetryStarted);
        assert_eq!(received.session_id, "s1");
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(event(RuntimeEventType::TurnFailed));
    }

    #[test]
    fn event_type_wire_names() {
        let json = serde_json::to_value(event(RuntimeEventType::CompactionFinished)).unwrap();
        assert_eq!(json["type"], "COMPACTION_FINISHED");
    }
}
