//! Tools: the calls a model requests, their results, and the executor
//! seam the turn loop drives.
//!
//! Concrete tools live outside this workspace. They plug in either by
//! implementing [`Tool`] and registering in a [`ToolRegistry`], or by
//! providing a whole [`ToolExecutor`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::context::TurnContext;
use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::response::Attachment;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within one model response
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments keyed by parameter name
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// A string argument, if present and a string.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// Why a tool call did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolFailureKind {
    ExecutionFailed,
    ConfirmationDenied,
    PolicyDenied,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<ToolFailureKind>,

    /// A file the tool wants delivered alongside the reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn failure(kind: ToolFailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            failure_kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Text written into the tool-result message.
    pub fn render(&self) -> String {
        if self.success {
            self.output.clone().unwrap_or_default()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown error"))
        }
    }
}

/// Everything the turn loop needs to know about one executed (or
/// deliberately not executed) tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionOutcome {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: ToolResult,

    /// Rendered text for the tool-result message
    pub message_content: String,

    /// The tool was cut short by a user interrupt.
    #[serde(default)]
    pub interrupted: bool,

    /// The outcome was fabricated by the loop, not produced by a tool.
    #[serde(default)]
    pub synthetic: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl ToolExecutionOutcome {
    /// Wrap a real tool result. Any attachment moves from the result onto
    /// the outcome.
    pub fn from_result(call: &ToolCall, mut result: ToolResult) -> Self {
        let attachment = result.attachment.take();
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            message_content: result.render(),
            result,
            interrupted: false,
            synthetic: false,
            attachment,
        }
    }

    /// A failed outcome the loop produced on the tool's behalf.
    pub fn synthetic(call: &ToolCall, kind: ToolFailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result: ToolResult::failure(kind, message.clone()),
            message_content: message,
            interrupted: false,
            synthetic: true,
            attachment: None,
        }
    }

    /// A successful outcome the loop produced without running the tool.
    pub fn synthetic_success(call: &ToolCall, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result: ToolResult::success(message.clone()),
            message_content: message,
            interrupted: false,
            synthetic: true,
            attachment: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.success
    }

    pub fn failure_kind(&self) -> Option<ToolFailureKind> {
        self.result.failure_kind
    }
}

/// The executor seam the turn loop calls for every tool call, in order.
///
/// Implementations may fail; the loop turns any error into a failed
/// outcome instead of aborting the turn.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        context: &TurnContext,
        call: &ToolCall,
    ) -> std::result::Result<ToolExecutionOutcome, ToolError>;
}

/// A single tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "filesystem").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(
        &self,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<ToolResult, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A name-indexed set of tools that doubles as a [`ToolExecutor`].
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Tool definitions sorted by name, ready to send to the LLM.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(
        &self,
        _context: &TurnContext,
        call: &ToolCall,
    ) -> std::result::Result<ToolExecutionOutcome, ToolError> {
        let Some(tool) = self.tools.get(&call.name) else {
            let message = format!(
                "Unknown tool: {}. Available tools: {}",
                call.name,
                self.names().join(", ")
            );
            let result = ToolResult::failure(ToolFailureKind::PolicyDenied, message);
            return Ok(ToolExecutionOutcome::from_result(call, result));
        };

        let result = tool.execute(call.arguments.clone()).await?;
        Ok(ToolExecutionOutcome::from_result(call, result))
    }
}
