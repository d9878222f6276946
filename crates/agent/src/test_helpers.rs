//! Shared scripted collaborators for turn tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rivet_core::context::TurnContext;
use rivet_core::error::{ProviderError, ToolError};
use rivet_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use rivet_core::tool::{ToolCall, ToolExecutionOutcome, ToolExecutor, ToolResult};

/// A provider that replays a script of results, one per call.
///
/// Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn chat(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("SequentialMockProvider: no more responses (call #{call})"))
    }
}

type Behaviour = Box<dyn Fn(&TurnContext, &ToolCall) -> Result<ToolExecutionOutcome, ToolError> + Send + Sync>;

/// A tool executor driven by a closure that records every call it sees.
pub struct ScriptedToolExecutor {
    behaviour: Behaviour,
    executed: Mutex<Vec<String>>,
}

impl ScriptedToolExecutor {
    pub fn new(
        behaviour: impl Fn(&TurnContext, &ToolCall) -> Result<ToolExecutionOutcome, ToolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            behaviour: Box::new(behaviour),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds with `ok: <tool name>`.
    pub fn succeeding() -> Self {
        Self::new(|_, call| {
            Ok(ToolExecutionOutcome::from_result(call, ToolResult::success(format!("ok: {}", call.name))))
        })
    }

    /// Ids of the calls executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for ScriptedToolExecutor {
    async fn execute(&self, context: &TurnContext, call: &ToolCall) -> Result<ToolExecutionOutcome, ToolError> {
        self.executed.lock().unwrap().push(call.id.clone());
        (self.behaviour)(context, call)
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: Some("mock-model".into()),
        ..ProviderResponse::text(text)
    }
}

pub fn tool_response(calls: Vec<ToolCall>) -> ProviderResponse {
    ProviderResponse::tool_calls(None, calls)
}

pub fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args.as_object().cloned().unwrap_or_default())
}
