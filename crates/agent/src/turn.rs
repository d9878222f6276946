//! The turn processor: drives one turn from a conversation to a final
//! answer, a limit stop, or a recorded failure.
//!
//! Each iteration builds the conversation view, calls the model and
//! either runs the requested tool calls (then loops) or takes the reply as
//! the final answer. Transient model failures are retried with backoff,
//! a context overflow triggers one compaction, and every loop boundary
//! checks the call-count and deadline limits.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rivet_config::ToolLoopConfig;
use rivet_core::code::LlmErrorCode;
use rivet_core::compaction::{CompactionReason, CompactionService};
use rivet_core::context::{FailureEvent, FailureKind, FailureSource, TurnContext};
use rivet_core::error::ProviderError;
use rivet_core::event::RuntimeEventType;
use rivet_core::limits::{RuntimeLimitsProvider, TurnLimits};
use rivet_core::model::{ModelSelection, ModelSelector};
use rivet_core::plan::PlanRecorder;
use rivet_core::provider::{Provider, ProviderRequest, ProviderResponse};
use rivet_core::response::OutgoingResponse;
use rivet_core::tool::{ToolCall, ToolExecutionOutcome, ToolExecutor, ToolFailureKind, ToolResult};
use rivet_core::turn::{TurnLimitReason, TurnOutcome, TurnResult};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error_classifier::{classify_empty_response, classify_error};
use crate::events::{RuntimeEventRecorder, payload};
use crate::file_changes::{FileChangeTracker, merge_stat};
use crate::history::{DefaultHistoryWriter, HistoryWriter};
use crate::view::{ConversationViewBuilder, MaskingPolicy};

/// Extra model calls allowed when the model returns a blank final answer.
pub const EMPTY_FINAL_RESPONSE_MAX_RETRIES: u32 = 2;

/// Upper bound for a single retry backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(3000);

const COMPONENT: &str = "TurnProcessor";

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped
/// at [`MAX_RETRY_DELAY`]. The base never goes below 1ms.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let base = base.max(Duration::from_millis(1));
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

/// Per-turn counters.
struct TurnState {
    started: Instant,
    limits: TurnLimits,
    selection: ModelSelection,
    masking: MaskingPolicy,
    llm_calls: u32,
    tool_executions: u32,
    empty_retries: u32,
    compaction_attempted: bool,
}

impl TurnState {
    fn deadline_passed(&self) -> bool {
        self.started.elapsed() >= self.limits.deadline
    }

    fn calls_left(&self) -> bool {
        self.llm_calls < self.limits.max_llm_calls
    }
}

/// What the tool phase of an iteration decided.
enum ToolPhase {
    Continue,
    Finished(TurnOutcome),
}

/// Orchestrates one turn over the collaborators it is built with.
///
/// One instance may serve many sessions concurrently; all per-turn state
/// lives in the [`TurnContext`] and on the stack of `process_turn`. At most
/// one turn per session may run at a time.
pub struct TurnProcessor {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolExecutor>,
    selector: Arc<dyn ModelSelector>,
    limits: Arc<dyn RuntimeLimitsProvider>,
    history: Arc<dyn HistoryWriter>,
    view: ConversationViewBuilder,
    events: RuntimeEventRecorder,
    plans: Option<Arc<dyn PlanRecorder>>,
    compaction: Option<Arc<dyn CompactionService>>,
    file_changes: Option<FileChangeTracker>,
    policy: ToolLoopConfig,
}

impl TurnProcessor {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        selector: Arc<dyn ModelSelector>,
        limits: Arc<dyn RuntimeLimitsProvider>,
    ) -> Self {
        Self {
            provider,
            tools,
            selector,
            limits,
            history: Arc::new(DefaultHistoryWriter),
            view: ConversationViewBuilder::default(),
            events: RuntimeEventRecorder::new(),
            plans: None,
            compaction: None,
            file_changes: None,
            policy: ToolLoopConfig::default(),
        }
    }

    pub fn with_history_writer(mut self, history: Arc<dyn HistoryWriter>) -> Self {
        self.history = history;
        self
    }

    pub fn with_view_builder(mut self, view: ConversationViewBuilder) -> Self {
        self.view = view;
        self
    }

    pub fn with_event_recorder(mut self, events: RuntimeEventRecorder) -> Self {
        self.events = events;
        self
    }

    /// Enable plan capture. Without a recorder, plan mode is never active.
    pub fn with_plan_recorder(mut self, plans: Arc<dyn PlanRecorder>) -> Self {
        self.plans = Some(plans);
        self
    }

    /// Enable context-overflow recovery.
    pub fn with_compaction(mut self, compaction: Arc<dyn CompactionService>) -> Self {
        self.compaction = Some(compaction);
        self
    }

    pub fn with_file_changes(mut self, tracker: FileChangeTracker) -> Self {
        self.file_changes = Some(tracker);
        self
    }

    pub fn with_tool_loop_policy(mut self, policy: ToolLoopConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Run one turn to completion.
    ///
    /// Always terminates in exactly one of: a final answer
    /// (`ctx.final_answer_ready`), a limit stop (`ctx.limit_reason`), or a
    /// failure (`ctx.llm_error_code` plus a [`FailureEvent`]).
    pub async fn process_turn(&self, ctx: &mut TurnContext) -> TurnResult {
        let limits = self.limits.turn_limits();
        let selection = self.selector.resolve_for_tier(ctx.model_tier);
        ctx.llm_model = Some(selection.model.clone());
        ctx.llm_reasoning = selection.reasoning_effort.clone();

        let flatten = match ctx.session.last_model() {
            Some(last) => last != selection.model,
            None => ctx.session.has_tool_messages(),
        };
        ctx.session.set_last_model(&selection.model);
        let masking = if flatten {
            MaskingPolicy::MaskBefore(ctx.messages.len())
        } else {
            MaskingPolicy::Preserve
        };

        info!(
            session_id = %ctx.session.id,
            model = %selection.model,
            messages = ctx.messages.len(),
            flatten,
            "Turn started"
        );
        let tier = ctx.model_tier.map(|t| t.as_str());
        self.events.emit(
            ctx,
            RuntimeEventType::TurnStarted,
            payload(json!({ "model": selection.model, "tier": tier, "flatten": flatten })),
        );

        let mut state = TurnState {
            started: Instant::now(),
            limits,
            selection,
            masking,
            llm_calls: 0,
            tool_executions: 0,
            empty_retries: 0,
            compaction_attempted: false,
        };

        let outcome = loop {
            if let Some(reason) = self.limit_breach(&state) {
                break self.stop_for_limit(ctx, &state, reason);
            }

            debug!(session_id = %ctx.session.id, llm_calls = state.llm_calls, "Turn iteration");

            let response = match self.call_model(ctx, &mut state).await {
                Ok(response) => response,
                Err(code) => break TurnOutcome::Failed { code },
            };

            if response.has_tool_calls() {
                match self.run_tool_calls(ctx, &mut state, response).await {
                    ToolPhase::Continue => continue,
                    ToolPhase::Finished(outcome) => break outcome,
                }
            }

            if !ctx.voice_requested()
                && let Some(code) = classify_empty_response(Some(&response))
            {
                if state.empty_retries < EMPTY_FINAL_RESPONSE_MAX_RETRIES {
                    state.empty_retries += 1;
                    warn!(
                        session_id = %ctx.session.id,
                        code = %code,
                        retry = state.empty_retries,
                        "Empty final answer, asking again"
                    );
                    continue;
                }
                break self.fail_empty_answer(ctx, &state, code, response);
            }

            let text = response.content.clone().unwrap_or_default();
            self.history.append_final_assistant_answer(ctx, &text);
            ctx.llm_response = Some(response);
            ctx.final_answer_ready = true;
            break TurnOutcome::FinalAnswer;
        };

        self.finish(ctx, &state, &outcome);
        TurnResult {
            final_answer_ready: ctx.final_answer_ready,
            llm_calls: state.llm_calls,
            tool_executions: state.tool_executions,
            outcome,
        }
    }

    fn limit_breach(&self, state: &TurnState) -> Option<TurnLimitReason> {
        if state.deadline_passed() {
            Some(TurnLimitReason::DeadlineExceeded)
        } else if !state.calls_left() {
            Some(TurnLimitReason::MaxLlmCalls)
        } else {
            None
        }
    }

    /// Call the model, retrying transient failures and recovering once
    /// from a context overflow. On a fatal failure the error is recorded on
    /// the context and its code returned.
    async fn call_model(&self, ctx: &mut TurnContext, state: &mut TurnState) -> Result<ProviderResponse, LlmErrorCode> {
        let mut retries = 0u32;
        loop {
            let view = self.view.build_view(&ctx.messages, state.masking);
            for note in &view.diagnostics {
                debug!(session_id = %ctx.session.id, masker = self.view.masker_name(), "{note}");
            }

            let mut request = ProviderRequest::new(state.selection.model.clone(), view.messages);
            request.reasoning_effort = state.selection.reasoning_effort.clone();
            request.system_prompt = ctx.system_prompt.clone();
            request.tools = ctx.available_tools.clone();
            request.session_id = Some(ctx.session.id.to_string());

            state.llm_calls += 1;
            self.events.emit(ctx, RuntimeEventType::LlmStarted, payload(json!({ "attempt": state.llm_calls })));

            let err = match self.provider.chat(request).await {
                Ok(response) => {
                    self.events.emit(
                        ctx,
                        RuntimeEventType::LlmFinished,
                        payload(json!({
                            "attempt": state.llm_calls,
                            "success": true,
                            "hasToolCalls": response.has_tool_calls(),
                        })),
                    );
                    if retries > 0 {
                        info!(session_id = %ctx.session.id, retries, "Model call succeeded after retry");
                        self.events.emit(
                            ctx,
                            RuntimeEventType::RetryFinished,
                            payload(json!({ "attempt": retries, "success": true })),
                        );
                    }
                    ctx.llm_error = None;
                    ctx.llm_error_code = None;
                    return Ok(response);
                }
                Err(err) => err,
            };

            let code = classify_error(Some(&err as &(dyn StdError + 'static)));
            self.events.emit(
                ctx,
                RuntimeEventType::LlmFinished,
                payload(json!({ "attempt": state.llm_calls, "success": false, "code": code.as_str() })),
            );

            let can_call_again = state.calls_left() && !state.deadline_passed();

            if code.is_transient()
                && state.limits.auto_retry_enabled
                && retries < state.limits.auto_retry_max_attempts
                && can_call_again
            {
                retries += 1;
                let delay = retry_delay(state.limits.auto_retry_base_delay, retries);
                info!(
                    session_id = %ctx.session.id,
                    code = %code,
                    attempt = retries,
                    delay_ms = delay.as_millis() as u64,
                    "Transient model failure, retrying"
                );
                self.events.emit(
                    ctx,
                    RuntimeEventType::RetryStarted,
                    payload(json!({
                        "attempt": retries,
                        "maxAttempts": state.limits.auto_retry_max_attempts,
                        "delayMs": delay.as_millis() as u64,
                        "code": code.as_str(),
                    })),
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if code.is_context_overflow()
                && retries == 0
                && !state.compaction_attempted
                && can_call_again
                && self.recover_from_overflow(ctx, state).await
            {
                continue;
            }

            return Err(self.fail_model_call(ctx, state, code, &err, retries + 1));
        }
    }

    /// Compact the session once. Returns whether the call may be retried.
    async fn recover_from_overflow(&self, ctx: &mut TurnContext, state: &mut TurnState) -> bool {
        let Some(compaction) = &self.compaction else {
            return false;
        };
        let total = ctx.session.messages.len();
        let keep_last = state.limits.compaction_keep_last;
        if total == 0 || total <= keep_last {
            debug!(session_id = %ctx.session.id, total, keep_last, "Context overflow, too few messages to compact");
            return false;
        }

        state.compaction_attempted = true;
        info!(session_id = %ctx.session.id, total, keep_last, "Context overflow, compacting session");
        self.events.emit(
            ctx,
            RuntimeEventType::CompactionStarted,
            payload(json!({ "llmCall": state.llm_calls, "messages": total, "keepLast": keep_last })),
        );

        let result = compaction
            .compact(&mut ctx.session, CompactionReason::ContextOverflowRecovery, keep_last)
            .await;

        let result = match result {
            Ok(result) if result.removed > 0 => result,
            Ok(_) => {
                warn!(session_id = %ctx.session.id, "Compaction removed nothing");
                self.events.emit(
                    ctx,
                    RuntimeEventType::CompactionFinished,
                    payload(json!({ "removed": 0, "kept": total, "usedSummary": false })),
                );
                return false;
            }
            Err(e) => {
                warn!(session_id = %ctx.session.id, error = %e, "Compaction failed");
                self.events.emit(
                    ctx,
                    RuntimeEventType::CompactionFinished,
                    payload(json!({ "removed": 0, "kept": total, "usedSummary": false, "error": e.to_string() })),
                );
                return false;
            }
        };

        let kept = result.details.as_ref().map(|d| d.kept).unwrap_or_else(|| total.saturating_sub(result.removed));
        self.events.emit(
            ctx,
            RuntimeEventType::CompactionFinished,
            payload(json!({ "removed": result.removed, "kept": kept, "usedSummary": result.used_summary })),
        );

        ctx.reload_messages();
        ctx.llm_error = None;
        ctx.llm_error_code = None;
        if let Some(details) = result.details {
            for stat in &details.file_changes {
                merge_stat(&mut ctx.file_changes, stat.clone());
            }
            ctx.compaction = Some(details);
        }
        if let MaskingPolicy::MaskBefore(_) = state.masking {
            state.masking = MaskingPolicy::MaskBefore(ctx.messages.len());
        }
        true
    }

    async fn run_tool_calls(
        &self,
        ctx: &mut TurnContext,
        state: &mut TurnState,
        response: ProviderResponse,
    ) -> ToolPhase {
        self.history.append_assistant_tool_calls(ctx, &response);
        let calls = response.tool_calls.clone();
        ctx.llm_response = Some(response);

        let plan = self
            .plans
            .as_ref()
            .filter(|p| p.is_plan_mode_active())
            .map(|p| (p.clone(), p.active_plan_id()));

        debug!(session_id = %ctx.session.id, count = calls.len(), planning = plan.is_some(), "Running tool calls");

        for (index, call) in calls.iter().enumerate() {
            if state.deadline_passed() {
                return ToolPhase::Finished(self.stop_for_limit(ctx, state, TurnLimitReason::DeadlineExceeded));
            }

            if let Some((recorder, plan_id)) = &plan {
                let outcome = plan_step(recorder.as_ref(), plan_id.as_deref(), call).await;
                self.history.append_tool_result(ctx, &outcome);
                if self.skip_if_interrupted(ctx, &calls[index + 1..], outcome.interrupted) {
                    break;
                }
                continue;
            }

            if state.tool_executions >= state.limits.max_tool_executions {
                return ToolPhase::Finished(self.stop_for_limit(ctx, state, TurnLimitReason::MaxToolExecutions));
            }

            let outcome = self.execute_tool(ctx, call).await;
            state.tool_executions += 1;

            if let Some(attachment) = outcome.attachment.clone() {
                ctx.outgoing
                    .get_or_insert_with(OutgoingResponse::default)
                    .attachments
                    .push(attachment);
            }
            self.history.append_tool_result(ctx, &outcome);

            if let Some(reason) = self.policy_stop_reason(&outcome) {
                warn!(session_id = %ctx.session.id, tool = %outcome.tool_name, %reason, "Stopping tool loop");
                self.synthesize_stop(ctx, &reason);
                ctx.final_answer_ready = true;
                return ToolPhase::Finished(TurnOutcome::Stopped { reason });
            }

            if self.skip_if_interrupted(ctx, &calls[index + 1..], outcome.interrupted) {
                break;
            }
        }

        ToolPhase::Continue
    }

    /// Interrupt checkpoint after each call. Clears the flag and gives the
    /// rest of the batch a synthetic result; returns whether it fired.
    fn skip_if_interrupted(&self, ctx: &mut TurnContext, skipped: &[ToolCall], interrupted: bool) -> bool {
        let flagged = ctx.session.interrupt().take();
        if !flagged && !interrupted {
            return false;
        }
        info!(session_id = %ctx.session.id, skipped = skipped.len(), "Interrupted, skipping remaining tool calls");
        for rest in skipped {
            let mut outcome =
                ToolExecutionOutcome::synthetic(rest, ToolFailureKind::ExecutionFailed, "Tool call skipped: interrupted by user");
            outcome.interrupted = true;
            self.history.append_tool_result(ctx, &outcome);
        }
        true
    }

    async fn execute_tool(&self, ctx: &mut TurnContext, call: &ToolCall) -> ToolExecutionOutcome {
        self.events.emit(
            ctx,
            RuntimeEventType::ToolStarted,
            payload(json!({ "toolCallId": call.id, "tool": call.name })),
        );

        let pending = match &self.file_changes {
            Some(tracker) => tracker.prepare(call).await,
            None => None,
        };

        let started = Instant::now();
        let outcome = match self.tools.execute(ctx, call).await {
            Ok(outcome) => outcome,
            Err(e) => ToolExecutionOutcome::from_result(call, ToolResult::failure(ToolFailureKind::ExecutionFailed, e.to_string())),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        if outcome.is_success() {
            if let (Some(tracker), Some(pending)) = (&self.file_changes, &pending) {
                tracker.record(ctx, pending);
            }
        } else {
            warn!(
                session_id = %ctx.session.id,
                tool = %call.name,
                kind = ?outcome.failure_kind(),
                "Tool call failed: {}",
                outcome.message_content
            );
        }

        self.events.emit(
            ctx,
            RuntimeEventType::ToolFinished,
            payload(json!({
                "toolCallId": call.id,
                "tool": call.name,
                "success": outcome.is_success(),
                "durationMs": duration_ms,
            })),
        );
        outcome
    }

    fn policy_stop_reason(&self, outcome: &ToolExecutionOutcome) -> Option<String> {
        if outcome.is_success() {
            return None;
        }
        match outcome.failure_kind() {
            Some(ToolFailureKind::ConfirmationDenied) if self.policy.stop_on_confirmation_denied => {
                Some("confirmation denied".into())
            }
            Some(ToolFailureKind::PolicyDenied) if self.policy.stop_on_tool_policy_denied => {
                Some("tool denied by policy".into())
            }
            Some(ToolFailureKind::ExecutionFailed) | None if self.policy.stop_on_tool_failure => {
                Some(format!("tool failure ({})", outcome.tool_name))
            }
            _ => None,
        }
    }

    fn stop_for_limit(&self, ctx: &mut TurnContext, state: &TurnState, reason: TurnLimitReason) -> TurnOutcome {
        let text = match reason {
            TurnLimitReason::MaxLlmCalls => format!("reached max internal LLM calls ({})", state.limits.max_llm_calls),
            TurnLimitReason::MaxToolExecutions => {
                format!("reached max tool executions ({})", state.limits.max_tool_executions)
            }
            TurnLimitReason::DeadlineExceeded => "deadline exceeded".to_string(),
        };
        warn!(
            session_id = %ctx.session.id,
            reason = reason.as_str(),
            llm_calls = state.llm_calls,
            tool_executions = state.tool_executions,
            "Turn limit reached"
        );
        self.synthesize_stop(ctx, &text);
        ctx.limit_reason = Some(reason);
        TurnOutcome::LimitReached(reason)
    }

    /// Close out the pending response: give every unanswered tool call a
    /// failed result, then replace the response with a tool-call free stop
    /// message and write it to history.
    fn synthesize_stop(&self, ctx: &mut TurnContext, reason: &str) {
        let pending: Vec<ToolCall> = ctx
            .llm_response
            .as_ref()
            .map(|r| r.tool_calls.iter().filter(|c| !ctx.has_tool_result(&c.id)).cloned().collect())
            .unwrap_or_default();
        for call in &pending {
            let outcome = ToolExecutionOutcome::synthetic(
                call,
                ToolFailureKind::ExecutionFailed,
                format!("Tool loop stopped: {reason}"),
            );
            self.history.append_tool_result(ctx, &outcome);
        }

        let text = format!("Tool loop stopped: {reason}.");
        let mut response = ProviderResponse::text(text.clone());
        response.model = ctx.llm_model.clone();
        self.history.append_final_assistant_answer(ctx, &text);
        ctx.llm_response = Some(response);
    }

    fn fail_model_call(
        &self,
        ctx: &mut TurnContext,
        state: &TurnState,
        code: LlmErrorCode,
        err: &ProviderError,
        attempts: u32,
    ) -> LlmErrorCode {
        let message = code.tag(&format!(
            "LLM call failed after {attempts} attempt(s) (model={}, errorType={}, message={err})",
            state.selection.model,
            err.kind()
        ));
        error!(session_id = %ctx.session.id, code = %code, attempts, "{message}");
        self.record_failure(ctx, code.clone(), message, FailureKind::Exception);
        code
    }

    fn fail_empty_answer(
        &self,
        ctx: &mut TurnContext,
        state: &TurnState,
        code: LlmErrorCode,
        response: ProviderResponse,
    ) -> TurnOutcome {
        let message = code.tag(&format!(
            "LLM returned empty final response after {} attempt(s) (model={}, finishReason={})",
            state.empty_retries + 1,
            response.model.as_deref().unwrap_or(&state.selection.model),
            response.finish_reason.as_deref().unwrap_or("unknown")
        ));
        error!(session_id = %ctx.session.id, code = %code, "{message}");
        ctx.llm_response = Some(response);
        self.record_failure(ctx, code.clone(), message, FailureKind::Validation);
        TurnOutcome::Failed { code }
    }

    fn record_failure(&self, ctx: &mut TurnContext, code: LlmErrorCode, message: String, kind: FailureKind) {
        ctx.llm_error = Some(message.clone());
        ctx.llm_error_code = Some(code);
        ctx.add_failure(FailureEvent {
            source: FailureSource::Llm,
            component: COMPONENT.to_string(),
            kind,
            message,
            timestamp: Utc::now(),
        });
    }

    fn finish(&self, ctx: &mut TurnContext, state: &TurnState, outcome: &TurnOutcome) {
        let elapsed_ms = state.started.elapsed().as_millis() as u64;
        let counts = json!({ "llmCalls": state.llm_calls, "toolExecutions": state.tool_executions, "elapsedMs": elapsed_ms });
        let mut body = payload(counts);

        let event_type = match outcome {
            TurnOutcome::FinalAnswer => {
                body.insert("reason".into(), json!("final_answer"));
                RuntimeEventType::TurnFinished
            }
            TurnOutcome::Stopped { reason } => {
                body.insert("reason".into(), json!("stopped"));
                body.insert("detail".into(), json!(reason));
                RuntimeEventType::TurnFinished
            }
            TurnOutcome::LimitReached(limit) => {
                body.insert("reason".into(), json!("limit"));
                body.insert("limit".into(), json!(limit.as_str()));
                RuntimeEventType::TurnFinished
            }
            TurnOutcome::Failed { code } => {
                body.insert("reason".into(), json!("llm_error"));
                body.insert("code".into(), json!(code.as_str()));
                RuntimeEventType::TurnFailed
            }
        };
        self.events.emit(ctx, event_type, body);

        info!(
            session_id = %ctx.session.id,
            outcome = ?outcome,
            llm_calls = state.llm_calls,
            tool_executions = state.tool_executions,
            elapsed_ms,
            "Turn finished"
        );
    }
}

/// Record a call as a plan step instead of running it.
async fn plan_step(recorder: &dyn PlanRecorder, plan_id: Option<&str>, call: &ToolCall) -> ToolExecutionOutcome {
    let Some(plan_id) = plan_id else {
        return ToolExecutionOutcome::synthetic(
            call,
            ToolFailureKind::PolicyDenied,
            "Plan mode is active but no plan is open; tool call not executed",
        );
    };

    let args = serde_json::to_string(&call.arguments).unwrap_or_default();
    let description = format!("{}({args})", call.name);
    match recorder.add_step(plan_id, &call.name, &call.arguments, &description).await {
        Ok(()) => ToolExecutionOutcome::synthetic_success(call, format!("[Planned] {description}")),
        Err(e) => {
            warn!(plan_id, tool = %call.name, error = %e, "Failed to record plan step");
            ToolExecutionOutcome::synthetic(call, ToolFailureKind::ExecutionFailed, format!("Failed to record plan step: {e}"))
        }
    }
}
