//! Runtime event recording.

use std::sync::Arc;

use chrono::Utc;
use rivet_core::context::TurnContext;
use rivet_core::event::{EventBus, RuntimeEvent, RuntimeEventType};
use serde_json::{Map, Value};
use tracing::debug;

/// Appends lifecycle events to the turn context and optionally forwards
/// them to an [`EventBus`] for live subscribers.
#[derive(Clone, Default)]
pub struct RuntimeEventRecorder {
    bus: Option<Arc<EventBus>>,
}

impl RuntimeEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bus(bus: Arc<EventBus>) -> Self {
        Self { bus: Some(bus) }
    }

    pub fn emit(&self, ctx: &mut TurnContext, event_type: RuntimeEventType, payload: Map<String, Value>) {
        let event = RuntimeEvent {
            event_type,
            timestamp: Utc::now(),
            session_id: ctx.session.id.to_string(),
            channel_type: ctx.session.channel_type.clone(),
            chat_id: ctx.session.chat_id.clone(),
            payload,
        };
        debug!(session_id = %event.session_id, event = ?event_type, "Runtime event");

        if let Some(bus) = &self.bus {
            bus.publish(event.clone());
        }
        ctx.runtime_events.push(event);
    }
}

/// An event payload from a `json!({...})` object. Non-objects give an
/// empty payload.
pub fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
