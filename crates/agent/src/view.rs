//! Conversation view: projects raw session history into the exact message
//! sequence sent to the model.
//!
//! The builder never mutates the history it is given. It can window the
//! history (dropping the oldest messages) and apply a pluggable
//! [`ToolMessageMasker`] to the part of history written before the current
//! model took over.

use std::collections::{HashMap, HashSet};

use rivet_config::{MaskingMode, ViewConfig};
use rivet_core::message::{Message, Role};
use rivet_core::tool::ToolCall;

/// Which part of the history the masker applies to, decided per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskingPolicy {
    /// Send tool history as structured messages.
    Preserve,
    /// Mask the first `n` messages of the history; later ones pass through.
    MaskBefore(usize),
}

#[derive(Debug, Clone, Default)]
pub struct ConversationView {
    pub messages: Vec<Message>,
    /// Human-readable notes for logging
    pub diagnostics: Vec<String>,
}

/// A strategy for rewriting tool-call/tool-result history.
pub trait ToolMessageMasker: Send + Sync {
    fn name(&self) -> &'static str;

    fn mask(&self, messages: &[Message]) -> ConversationView;
}

/// Leaves tool history untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughMasker;

impl ToolMessageMasker for PassthroughMasker {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn mask(&self, messages: &[Message]) -> ConversationView {
        ConversationView {
            messages: messages.to_vec(),
            diagnostics: Vec::new(),
        }
    }
}

/// Collapses each assistant tool-call message and its results into one
/// plain assistant message:
///
/// ```text
/// Let me check.
/// [Tool: filesystem({"operation":"read_file","path":"a.txt"})] -> hello
/// ```
#[derive(Debug, Clone)]
pub struct FlatteningMasker {
    pub max_args_chars: usize,
    pub max_result_chars: usize,
}

impl Default for FlatteningMasker {
    fn default() -> Self {
        Self {
            max_args_chars: 200,
            max_result_chars: 2000,
        }
    }
}

impl FlatteningMasker {
    fn render_call(&self, call: &ToolCall, result: Option<&Message>) -> String {
        let args = serde_json::to_string(&call.arguments).unwrap_or_default();
        let result = match result {
            None => "<no response>".to_string(),
            Some(msg) if msg.text().trim().is_empty() => "<empty>".to_string(),
            Some(msg) => truncate_chars(msg.text(), self.max_result_chars),
        };
        format!(
            "[Tool: {}({})] -> {}",
            call.name,
            truncate_chars(&args, self.max_args_chars),
            result
        )
    }
}

impl ToolMessageMasker for FlatteningMasker {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn mask(&self, messages: &[Message]) -> ConversationView {
        let has_tool_history = messages
            .iter()
            .any(|m| m.role == Role::Tool || m.has_tool_calls());
        if !has_tool_history {
            return ConversationView {
                messages: messages.to_vec(),
                diagnostics: vec!["no-op: no tool messages found".into()],
            };
        }

        let results: HashMap<&str, &Message> = messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.as_deref().map(|id| (id, m)))
            .collect();

        let mut merged: HashSet<&str> = HashSet::new();
        let mut out = Vec::with_capacity(messages.len());
        let mut flattened_calls = 0usize;
        let mut flattened_messages = 0usize;
        let mut orphans = 0usize;

        for msg in messages {
            if msg.role == Role::Assistant && msg.has_tool_calls() {
                let mut lines: Vec<String> = msg
                    .content
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .map(|c| vec![c.trim_end().to_string()])
                    .unwrap_or_default();

                for call in &msg.tool_calls {
                    lines.push(self.render_call(call, results.get(call.id.as_str()).copied()));
                    merged.insert(call.id.as_str());
                }

                let mut flat = msg.clone();
                flat.content = Some(lines.join("\n"));
                flat.tool_calls.clear();
                out.push(flat);
                flattened_calls += msg.tool_calls.len();
                flattened_messages += 1;
            } else if msg.role == Role::Tool {
                if msg.tool_call_id.as_deref().is_some_and(|id| merged.contains(id)) {
                    continue;
                }
                let name = msg.tool_name.as_deref().unwrap_or("unknown");
                let text = format!("[Tool: {name}] -> {}", truncate_chars(msg.text(), self.max_result_chars));
                let mut flat = msg.clone();
                flat.role = Role::Assistant;
                flat.content = Some(text);
                flat.tool_call_id = None;
                flat.tool_name = None;
                out.push(flat);
                orphans += 1;
            } else {
                out.push(msg.clone());
            }
        }

        let mut diagnostics = vec![format!(
            "Flattened {flattened_calls} tool call(s) in {flattened_messages} assistant message(s)"
        )];
        if orphans > 0 {
            diagnostics.push(format!("Converted {orphans} orphan tool result(s)"));
        }

        ConversationView {
            messages: out,
            diagnostics,
        }
    }
}

/// Builds the per-request message view.
pub struct ConversationViewBuilder {
    masker: Box<dyn ToolMessageMasker>,
    max_messages: Option<usize>,
}

impl ConversationViewBuilder {
    pub fn new(masker: Box<dyn ToolMessageMasker>) -> Self {
        Self {
            masker,
            max_messages: None,
        }
    }

    /// Select the masking strategy and window from configuration.
    pub fn from_config(config: &ViewConfig) -> Self {
        let masker: Box<dyn ToolMessageMasker> = match config.masking {
            MaskingMode::Flatten => Box::new(FlatteningMasker {
                max_args_chars: config.flatten_max_args_chars,
                max_result_chars: config.flatten_max_result_chars,
            }),
            MaskingMode::Passthrough => Box::new(PassthroughMasker),
        };
        let builder = Self::new(masker);
        match config.max_messages {
            0 => builder,
            n => builder.with_max_messages(n),
        }
    }

    /// Keep at most `max` of the most recent messages.
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max.max(1));
        self
    }

    pub fn masker_name(&self) -> &'static str {
        self.masker.name()
    }

    pub fn build_view(&self, history: &[Message], policy: MaskingPolicy) -> ConversationView {
        let mut diagnostics = Vec::new();

        let start = self.window_start(history);
        if start > 0 {
            diagnostics.push(format!("Truncated {start} messages"));
        }
        let window = &history[start..];

        let mask_upto = match policy {
            MaskingPolicy::Preserve => 0,
            MaskingPolicy::MaskBefore(n) => n.saturating_sub(start).min(window.len()),
        };

        if mask_upto == 0 {
            return ConversationView {
                messages: window.to_vec(),
                diagnostics,
            };
        }

        let masked = self.masker.mask(&window[..mask_upto]);
        diagnostics.extend(masked.diagnostics);
        let mut messages = masked.messages;
        messages.extend_from_slice(&window[mask_upto..]);

        ConversationView {
            messages,
            diagnostics,
        }
    }

    /// First index inside the window. Never starts on a tool result whose
    /// tool call fell outside the window.
    fn window_start(&self, history: &[Message]) -> usize {
        let Some(max) = self.max_messages else {
            return 0;
        };
        if history.len() <= max {
            return 0;
        }
        let mut start = history.len() - max;
        while start < history.len() && history[start].role == Role::Tool {
            start += 1;
        }
        start
    }
}

impl Default for ConversationViewBuilder {
    fn default() -> Self {
        Self::new(Box::new(FlatteningMasker::default()))
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
