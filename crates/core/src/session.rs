//! Sessions: the persistent transcript a turn reads and appends to.
//!
//! Only one turn may run against a session at a time. The
//! [`InterruptSignal`] is the single piece of state another party may touch
//! while a turn is in flight, and the turn only reads it between tool calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::message::{Message, Role};

/// Session metadata key holding the model id used by the previous call.
pub const MODEL_METADATA_KEY: &str = "llm.model";

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cooperative "stop after the current tool call" flag.
///
/// Clones share the same flag, so a tool or a UI handler can hold one and
/// request an interrupt while the turn runs.
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    requested: Arc<AtomicBool>,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

/// A conversation with one user on one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// e.g. "telegram", "web", "cli"
    pub channel_type: String,

    /// Transport-level chat identifier
    pub chat_id: String,

    /// The raw transcript, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip)]
    interrupt: InterruptSignal,
}

impl Session {
    pub fn new(channel_type: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            channel_type: channel_type.into(),
            chat_id: chat_id.into(),
            messages: Vec::new(),
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
            interrupt: InterruptSignal::new(),
        }
    }

    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// A handle to this session's interrupt flag.
    pub fn interrupt(&self) -> &InterruptSignal {
        &self.interrupt
    }

    /// The model id recorded by the previous model call, if any.
    pub fn last_model(&self) -> Option<&str> {
        self.metadata.get(MODEL_METADATA_KEY).and_then(|v| v.as_str())
    }

    pub fn set_last_model(&mut self, model: &str) {
        self.metadata
            .insert(MODEL_METADATA_KEY.to_string(), serde_json::Value::String(model.to_string()));
    }

    pub fn has_tool_messages(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::Tool || m.has_tool_calls())
    }
}
