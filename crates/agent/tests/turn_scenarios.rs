//! End-to-end turn scenarios through the public API of rivet-agent.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rivet_agent::{DefaultHistoryWriter, FileChangeTracker, HistoryWriter, KeepLastCompactionService, TurnProcessor};
use rivet_core::code::LlmErrorCode;
use rivet_core::context::TurnContext;
use rivet_core::error::{ProviderError, ToolError};
use rivet_core::event::RuntimeEventType;
use rivet_core::limits::TurnLimits;
use rivet_core::message::{Message, Role};
use rivet_core::model::{FixedModelSelector, ModelSelection};
use rivet_core::provider::{Provider, ProviderRequest, ProviderResponse};
use rivet_core::session::Session;
use rivet_core::tool::{Tool, ToolCall, ToolExecutionOutcome, ToolExecutor, ToolRegistry, ToolResult};
use rivet_core::turn::{TurnLimitReason, TurnOutcome};
use serde_json::json;

// ── Scripted collaborators ───────────────────────────────────────────────

/// Replays scripted results in order and keeps every request it saw.
struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider exhausted"))
    }
}

/// Asks for another tool call forever.
struct EndlessToolsProvider;

#[async_trait]
impl Provider for EndlessToolsProvider {
    fn name(&self) -> &str {
        "endless"
    }

    async fn chat(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = request.messages.len();
        Ok(ProviderResponse::tool_calls(
            None,
            vec![
                call(&format!("a{n}"), "echo", json!({})),
                call(&format!("b{n}"), "echo", json!({})),
            ],
        ))
    }
}

/// Executes tools in order, optionally raising the interrupt flag after
/// a given call id.
struct RecordingExecutor {
    executed: Mutex<Vec<String>>,
    interrupt_after: Option<String>,
}

impl RecordingExecutor {
    fn new() -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            interrupt_after: None,
        }
    }

    fn interrupting_after(id: &str) -> Self {
        Self {
            interrupt_after: Some(id.to_string()),
            ..Self::new()
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn execute(&self, ctx: &TurnContext, call: &ToolCall) -> Result<ToolExecutionOutcome, ToolError> {
        self.executed.lock().unwrap().push(call.id.clone());
        if self.interrupt_after.as_deref() == Some(call.id.as_str()) {
            ctx.session.interrupt().request();
        }
        Ok(ToolExecutionOutcome::from_result(call, ToolResult::success("done")))
    }
}

/// A tiny filesystem tool that writes under a root directory.
struct WriteFileTool {
    root: PathBuf,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn description(&self) -> &str {
        "Write files"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object" })
    }

    async fn execute(&self, arguments: serde_json::Map<String, serde_json::Value>) -> Result<ToolResult, ToolError> {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("path".into()))?;
        let content = arguments.get("content").and_then(|v| v.as_str()).unwrap_or_default();
        tokio::fs::write(self.root.join(path), content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "filesystem".into(),
                reason: e.to_string(),
            })?;
        Ok(ToolResult::success(format!("wrote {path}")))
    }
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args.as_object().cloned().unwrap_or_default())
}

fn limits() -> TurnLimits {
    TurnLimits {
        auto_retry_enabled: true,
        auto_retry_max_attempts: 2,
        ..TurnLimits::default()
    }
}

fn processor(provider: Arc<dyn Provider>, tools: Arc<dyn ToolExecutor>, limits: TurnLimits) -> TurnProcessor {
    TurnProcessor::new(
        provider,
        tools,
        Arc::new(FixedModelSelector(ModelSelection::new("test-model"))),
        Arc::new(limits),
    )
}

fn context(messages: Vec<Message>) -> TurnContext {
    let mut session = Session::new("cli", "local");
    for m in messages {
        session.push(m);
    }
    TurnContext::new(session)
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_plain_answer() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(ProviderResponse::text("Hello!"))]));
    let p = processor(provider, Arc::new(RecordingExecutor::new()), limits());
    let mut ctx = context(vec![Message::user("Hi")]);

    let result = p.process_turn(&mut ctx).await;

    assert!(result.final_answer_ready);
    assert_eq!(result.llm_calls, 1);
    assert!(ctx.llm_error_code.is_none());
    let assistants: Vec<_> = ctx.session.messages.iter().filter(|m| m.role == Role::Assistant).collect();
    assert_eq!(assistants.len(), 1);
    assert_eq!(assistants[0].text(), "Hello!");
}

#[tokio::test(start_paused = true)]
async fn scenario_b_rate_limit_then_success() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Err(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        }),
        Ok(ProviderResponse::text("Recovered.")),
    ]));
    let p = processor(provider, Arc::new(RecordingExecutor::new()), limits());
    let mut ctx = context(vec![Message::user("Hi")]);

    let result = p.process_turn(&mut ctx).await;

    assert_eq!(result.llm_calls, 2);
    assert!(result.final_answer_ready);
    assert_eq!(ctx.event_count(RuntimeEventType::RetryStarted), 1);
    assert_eq!(ctx.event_count(RuntimeEventType::RetryFinished), 1);
    assert!(ctx.llm_error_code.is_none());
    assert!(ctx.llm_error.is_none());
}

#[tokio::test]
async fn scenario_c_overflow_recovered_by_compaction() {
    let history: Vec<Message> = (0..8)
        .map(|i| if i % 2 == 0 { Message::user(format!("u{i}")) } else { Message::assistant(format!("a{i}")) })
        .collect();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Err(ProviderError::other("This model's maximum context length is 8192 tokens")),
        Ok(ProviderResponse::text("Short answer.")),
    ]));
    let mut limits = limits();
    limits.compaction_keep_last = 2;
    let p = processor(provider.clone(), Arc::new(RecordingExecutor::new()), limits)
        .with_compaction(Arc::new(KeepLastCompactionService::new()));
    let mut ctx = context(history);

    let result = p.process_turn(&mut ctx).await;

    assert_eq!(result.llm_calls, 2);
    assert!(result.final_answer_ready);
    assert_eq!(ctx.event_count(RuntimeEventType::CompactionStarted), 1);
    assert_eq!(ctx.event_count(RuntimeEventType::CompactionFinished), 1);

    let details = ctx.compaction.as_ref().unwrap();
    assert_eq!(details.removed, 6);
    assert_eq!(details.kept, 2);

    // the retried call saw the notice plus the two kept messages
    let retried = &provider.requests()[1].messages;
    assert_eq!(retried.len(), 3);
    assert_eq!(retried[0].role, Role::System);

    assert!(ctx.session.messages.iter().any(|m| m.role == Role::System && m.text().starts_with("[Compacted]")));
    assert_eq!(ctx.session.messages.last().unwrap().text(), "Short answer.");
}

#[tokio::test]
async fn scenario_d_interrupt_skips_rest_of_batch() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(ProviderResponse::tool_calls(
            None,
            vec![call("c1", "shell", json!({"cmd": "sleep 60"})), call("c2", "shell", json!({"cmd": "ls"}))],
        )),
        Ok(ProviderResponse::text("Stopped as you asked.")),
    ]));
    let tools = Arc::new(RecordingExecutor::interrupting_after("c1"));
    let p = processor(provider.clone(), tools.clone(), limits());
    let mut ctx = context(vec![Message::user("run both")]);

    let result = p.process_turn(&mut ctx).await;

    assert_eq!(tools.executed(), vec!["c1"]);
    assert!(!ctx.session.interrupt().is_requested());
    assert!(result.final_answer_ready);
    assert_eq!(result.tool_executions, 1);

    // the model saw both results on its next call
    let second = &provider.requests()[1].messages;
    let skipped = second.iter().find(|m| m.tool_call_id.as_deref() == Some("c2")).unwrap();
    assert_eq!(skipped.text(), "Tool call skipped: interrupted by user");
}

#[tokio::test]
async fn scenario_e_llm_call_limit_after_tool_calls() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(ProviderResponse::tool_calls(
        Some("Checking.".into()),
        vec![call("c1", "shell", json!({}))],
    ))]));
    let mut limits = limits();
    limits.max_llm_calls = 1;
    let p = processor(provider, Arc::new(RecordingExecutor::new()), limits);
    let mut ctx = context(vec![Message::user("go")]);

    let result = p.process_turn(&mut ctx).await;

    assert_eq!(result.outcome, TurnOutcome::LimitReached(TurnLimitReason::MaxLlmCalls));
    assert_eq!(ctx.limit_reason, Some(TurnLimitReason::MaxLlmCalls));
    assert!(!result.final_answer_ready);
    assert!(ctx.llm_error_code.is_none());

    let response = ctx.llm_response.as_ref().unwrap();
    assert!(!response.has_tool_calls());
    assert_eq!(response.content.as_deref(), Some("Tool loop stopped: reached max internal LLM calls (1)."));
}

#[tokio::test]
async fn scenario_f_new_file_line_stats() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(WriteFileTool {
        root: dir.path().to_path_buf(),
    }));

    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(ProviderResponse::tool_calls(
            None,
            vec![call(
                "c1",
                "filesystem",
                json!({"operation": "write_file", "path": "notes.md", "content": "one\ntwo\nthree\n"}),
            )],
        )),
        Ok(ProviderResponse::text("Written.")),
    ]));
    let p = processor(provider, Arc::new(registry), limits())
        .with_file_changes(FileChangeTracker::new("filesystem", dir.path()));
    let mut ctx = context(vec![Message::user("write notes")]);

    let result = p.process_turn(&mut ctx).await;

    assert!(result.final_answer_ready);
    assert!(dir.path().join("notes.md").exists());
    assert_eq!(ctx.file_changes.len(), 1);
    let stat = &ctx.file_changes[0];
    assert_eq!(stat.path, "notes.md");
    assert_eq!(stat.added_lines, 3);
    assert_eq!(stat.removed_lines, 0);
    assert!(!stat.deleted);
}

// ── Invariants ───────────────────────────────────────────────────────────

#[tokio::test]
async fn limits_bound_a_model_that_never_stops() {
    for (max_llm, max_tools) in [(1, 1), (3, 2), (5, 100), (10, 7)] {
        let mut limits = limits();
        limits.max_llm_calls = max_llm;
        limits.max_tool_executions = max_tools;
        let p = processor(Arc::new(EndlessToolsProvider), Arc::new(RecordingExecutor::new()), limits);
        let mut ctx = context(vec![Message::user("loop")]);

        let result = p.process_turn(&mut ctx).await;

        assert!(result.llm_calls <= max_llm);
        assert!(result.tool_executions <= max_tools);
        assert!(result.limit_reason().is_some());
        assert!(!result.final_answer_ready);

        // every tool call id has exactly one result
        let mut ids: Vec<_> = ctx.session.messages.iter().filter_map(|m| m.tool_call_id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}

#[tokio::test]
async fn failed_turn_has_single_terminal_state() {
    let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::other("socket hang up"))]));
    let p = processor(provider, Arc::new(RecordingExecutor::new()), limits());
    let mut ctx = context(vec![Message::user("hi")]);

    let result = p.process_turn(&mut ctx).await;

    assert_eq!(result.error_code(), Some(&LlmErrorCode::Unknown));
    assert!(!ctx.final_answer_ready);
    assert!(ctx.limit_reason.is_none());
    assert_eq!(ctx.failures.len(), 1);
    assert_eq!(ctx.event_count(RuntimeEventType::TurnFailed), 1);
    assert_eq!(ctx.event_count(RuntimeEventType::TurnFinished), 0);
}

#[test]
fn writing_a_recorded_tool_result_twice_is_a_noop() {
    let mut ctx = context(vec![Message::user("hi")]);
    let c = call("c1", "shell", json!({}));
    let outcome = ToolExecutionOutcome::from_result(&c, ToolResult::success("ok"));

    let writer = DefaultHistoryWriter;
    assert!(writer.append_tool_result(&mut ctx, &outcome));
    assert!(!writer.append_tool_result(&mut ctx, &outcome));
    assert_eq!(ctx.session.messages.len(), 2);
    assert_eq!(ctx.messages.len(), 2);
}
