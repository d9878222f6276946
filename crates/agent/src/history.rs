//! Writing finalized messages into the session transcript.
//!
//! Every append goes to both the turn's working messages and the session,
//! so the two never drift apart within a turn.

use rivet_core::context::TurnContext;
use rivet_core::message::{Message, Role};
use rivet_core::provider::ProviderResponse;
use rivet_core::tool::ToolExecutionOutcome;
use tracing::debug;

pub trait HistoryWriter: Send + Sync {
    /// Record the assistant message that requested tool calls.
    fn append_assistant_tool_calls(&self, ctx: &mut TurnContext, response: &ProviderResponse);

    /// Record a tool result. Returns `false` when a result for the same
    /// tool call id is already in history; nothing is written then.
    fn append_tool_result(&self, ctx: &mut TurnContext, outcome: &ToolExecutionOutcome) -> bool;

    /// Record the turn's final answer. Called at most once per turn.
    fn append_final_assistant_answer(&self, ctx: &mut TurnContext, text: &str);
}

/// Writes messages straight into the in-memory session.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHistoryWriter;

impl DefaultHistoryWriter {
    fn tag(ctx: &TurnContext, message: Message) -> Message {
        let mut message = message
            .with_metadata("channel_type", ctx.session.channel_type.clone())
            .with_metadata("chat_id", ctx.session.chat_id.clone());
        if let Some(model) = &ctx.llm_model {
            message = message.with_metadata("model", model.clone());
        }
        if let Some(tier) = ctx.model_tier {
            message = message.with_metadata("model_tier", tier.as_str());
        }
        message
    }

    fn push(ctx: &mut TurnContext, message: Message) {
        ctx.messages.push(message.clone());
        ctx.session.push(message);
    }
}

impl HistoryWriter for DefaultHistoryWriter {
    fn append_assistant_tool_calls(&self, ctx: &mut TurnContext, response: &ProviderResponse) {
        let content = response.content.clone().filter(|c| !c.trim().is_empty());
        let message = Self::tag(ctx, Message::assistant_tool_calls(content, response.tool_calls.clone()));
        Self::push(ctx, message);
    }

    fn append_tool_result(&self, ctx: &mut TurnContext, outcome: &ToolExecutionOutcome) -> bool {
        let already_written = ctx
            .session
            .messages
            .iter()
            .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(outcome.tool_call_id.as_str()));
        if already_written {
            debug!(tool_call_id = %outcome.tool_call_id, "Tool result already in history, skipping");
            return false;
        }

        ctx.add_tool_result(outcome.tool_call_id.clone(), outcome.result.clone());
        let message = Message::tool_result(
            outcome.tool_call_id.clone(),
            outcome.tool_name.clone(),
            outcome.message_content.clone(),
        );
        Self::push(ctx, message);
        true
    }

    fn append_final_assistant_answer(&self, ctx: &mut TurnContext, text: &str) {
        let message = Self::tag(ctx, Message::assistant(text));
        Self::push(ctx, message);
    }
}
