//! The turn context: a turn's mutable working set.
//!
//! Well-known per-turn state is a typed field. Anything genuinely dynamic
//! goes into [`Extensions`], addressed by a typed [`AttributeKey`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::code::LlmErrorCode;
use crate::compaction::{CompactionDetails, FileChangeStat};
use crate::event::{RuntimeEvent, RuntimeEventType};
use crate::message::Message;
use crate::model::ModelTier;
use crate::provider::{ProviderResponse, ToolDefinition};
use crate::response::OutgoingResponse;
use crate::session::Session;
use crate::tool::ToolResult;
use crate::turn::TurnLimitReason;

/// A typed name for a value stored in [`Extensions`].
///
/// ```
/// use rivet_core::context::{AttributeKey, Extensions};
///
/// const RETRIES_SEEN: AttributeKey<u32> = AttributeKey::new("retries_seen");
///
/// let mut ext = Extensions::default();
/// ext.insert(&RETRIES_SEEN, &3).unwrap();
/// assert_eq!(ext.get(&RETRIES_SEEN), Some(3));
/// ```
pub struct AttributeKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Serializable extension values keyed by [`AttributeKey`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extensions {
    values: serde_json::Map<String, serde_json::Value>,
}

impl Extensions {
    pub fn insert<T: Serialize>(&mut self, key: &AttributeKey<T>, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.name.to_string(), value);
        Ok(())
    }

    /// The stored value, or `None` when absent or not a `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &AttributeKey<T>) -> Option<T> {
        let value = self.values.get(key.name)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn remove<T>(&mut self, key: &AttributeKey<T>) -> bool {
        self.values.remove(key.name).is_some()
    }

    pub fn contains<T>(&self, key: &AttributeKey<T>) -> bool {
        self.values.contains_key(key.name)
    }

    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.values
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSource {
    Llm,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Exception,
    Validation,
}

/// A fatal problem recorded on the context for downstream handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvent {
    pub source: FailureSource,
    pub component: String,
    pub kind: FailureKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything one turn reads and writes.
///
/// Owned by the turn; only the turn processor and the collaborators it
/// calls touch it.
#[derive(Debug)]
pub struct TurnContext {
    pub session: Session,

    /// Working message sequence, kept in step with `session.messages`
    pub messages: Vec<Message>,

    pub model_tier: Option<ModelTier>,
    pub system_prompt: Option<String>,
    pub available_tools: Vec<ToolDefinition>,

    /// Results recorded this turn, by tool call id
    pub tool_results: HashMap<String, ToolResult>,

    /// The last model response (tool-call free once the turn is over)
    pub llm_response: Option<ProviderResponse>,
    pub llm_model: Option<String>,
    pub llm_reasoning: Option<String>,
    pub llm_error: Option<String>,
    pub llm_error_code: Option<LlmErrorCode>,

    /// Draft reply for the delivery layer
    pub outgoing: Option<OutgoingResponse>,

    pub limit_reason: Option<TurnLimitReason>,
    pub file_changes: Vec<FileChangeStat>,
    pub compaction: Option<CompactionDetails>,
    pub runtime_events: Vec<RuntimeEvent>,
    pub failures: Vec<FailureEvent>,
    pub final_answer_ready: bool,

    pub extensions: Extensions,
}

impl TurnContext {
    pub fn new(session: Session) -> Self {
        let messages = session.messages.clone();
        Self {
            session,
            messages,
            model_tier: None,
            system_prompt: None,
            available_tools: Vec::new(),
            tool_results: HashMap::new(),
            llm_response: None,
            llm_model: None,
            llm_reasoning: None,
            llm_error: None,
            llm_error_code: None,
            outgoing: None,
            limit_reason: None,
            file_changes: Vec::new(),
            compaction: None,
            runtime_events: Vec::new(),
            failures: Vec::new(),
            final_answer_ready: false,
            extensions: Extensions::default(),
        }
    }

    pub fn with_model_tier(mut self, tier: ModelTier) -> Self {
        self.model_tier = Some(tier);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.available_tools = tools;
        self
    }

    pub fn with_outgoing(mut self, outgoing: OutgoingResponse) -> Self {
        self.outgoing = Some(outgoing);
        self
    }

    /// Re-read the working messages from the session transcript.
    pub fn reload_messages(&mut self) {
        self.messages = self.session.messages.clone();
    }

    pub fn add_tool_result(&mut self, tool_call_id: impl Into<String>, result: ToolResult) {
        self.tool_results.insert(tool_call_id.into(), result);
    }

    pub fn has_tool_result(&self, tool_call_id: &str) -> bool {
        self.tool_results.contains_key(tool_call_id)
    }

    pub fn add_failure(&mut self, failure: FailureEvent) {
        self.failures.push(failure);
    }

    pub fn limit_reached(&self) -> bool {
        self.limit_reason.is_some()
    }

    /// Voice delivery was requested for this turn's reply.
    pub fn voice_requested(&self) -> bool {
        self.outgoing.as_ref().is_some_and(|o| o.wants_voice())
    }

    /// Text of the final response, if the turn produced one.
    pub fn final_text(&self) -> Option<&str> {
        self.llm_response.as_ref().and_then(|r| r.content.as_deref())
    }

    /// Count of recorded runtime events of `event_type`.
    pub fn event_count(&self, event_type: RuntimeEventType) -> usize {
        self.runtime_events.iter().filter(|e| e.event_type == event_type).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: AttributeKey<String> = AttributeKey::new("note");
    const COUNT: AttributeKey<u32> = AttributeKey::new("count");

    #[test]
    fn extensions_are_typed() {
        let mut ext = Extensions::default();
        ext.insert(&NOTE, &"hello".to_string()).unwrap();
        assert_eq!(ext.get(&NOTE).as_deref(), Some("hello"));
        assert!(ext.contains(&NOTE));
        assert!(ext.get(&COUNT).is_none());
        assert!(ext.remove(&NOTE));
        assert!(!ext.contains(&NOTE));
    }

    #[test]
    fn mismatched_shape_reads_as_none() {
        let mut ext = Extensions::default();
        const AS_STRING: AttributeKey<String> = AttributeKey::new("count");
        ext.insert(&AS_STRING, &"not a number".to_string()).unwrap();
        assert!(ext.get(&COUNT).is_none());
    }

    #[test]
    fn context_starts_from_session_messages() {
        let mut session = Session::new("cli", "local");
        session.push(Message::user("hi"));
        let ctx = TurnContext::new(session);
        assert_eq!(ctx.messages.len(), 1);
        assert!(!ctx.final_answer_ready);
        assert!(!ctx.limit_reached());
    }

    #[test]
    fn voice_flag_comes_from_outgoing_draft() {
        let ctx = TurnContext::new(Session::new("cli", "local"));
        assert!(!ctx.voice_requested());
        let ctx = ctx.with_outgoing(OutgoingResponse::voice_only("read this aloud"));
        assert!(ctx.voice_requested());
    }
}
