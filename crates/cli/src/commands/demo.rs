//! `rivet demo`: Run one scripted turn through the full turn processor.
//!
//! The provider is a canned two-step script (call a tool, then answer), so
//! the command works offline and shows the event stream, the final answer
//! and token usage for the configured limits.

use std::sync::Arc;

use async_trait::async_trait;
use rivet_agent::{
    ConversationViewBuilder, FileChangeTracker, InMemoryPlanRecorder, KeepLastCompactionService,
    RuntimeEventRecorder, TurnProcessor,
};
use rivet_config::AppConfig;
use rivet_core::error::{ProviderError, ToolError};
use rivet_core::message::{Message, Role};
use rivet_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use rivet_core::session::Session;
use rivet_core::tool::{Tool, ToolCall, ToolRegistry, ToolResult};
use rivet_core::{EventBus, TurnContext};
use rivet_providers::{InMemoryUsageTracker, UsageTrackingProvider};

/// Asks for the current time once, then answers with whatever the tool said.
struct DemoProvider;

#[async_trait]
impl Provider for DemoProvider {
    fn name(&self) -> &str {
        "demo"
    }

    async fn chat(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let tool_output = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Tool)
            .map(|m| m.text().to_string());

        let mut response = match tool_output {
            None => {
                let mut args = serde_json::Map::new();
                args.insert("format".into(), serde_json::json!("rfc3339"));
                ProviderResponse::tool_calls(
                    Some("Let me check the clock.".into()),
                    vec![ToolCall::new("demo-1", "clock", args)],
                )
            }
            Some(output) => ProviderResponse::text(format!("The clock tool reported: {output}")),
        };
        response.model = Some(request.model);
        response.usage = Some(Usage {
            prompt_tokens: 12 * request.messages.len() as u32,
            completion_tokens: 8,
            total_tokens: 12 * request.messages.len() as u32 + 8,
        });
        Ok(response)
    }
}

struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "clock"
    }

    fn description(&self) -> &str {
        "Returns the current UTC time"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "format": { "type": "string" } }
        })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::success(chrono::Utc::now().to_rfc3339()))
    }
}

pub async fn run(plan: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(AppConfig::load()?);

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ClockTool));
    let definitions = registry.definitions();

    let tracker = Arc::new(InMemoryUsageTracker::new());
    let provider = Arc::new(UsageTrackingProvider::new(Arc::new(DemoProvider), tracker.clone()));

    let bus = Arc::new(EventBus::new(64));
    let mut events_rx = bus.subscribe();

    let plans = Arc::new(InMemoryPlanRecorder::new());
    if plan {
        let id = plans.activate();
        println!("📝 Plan {id} active: tool calls are recorded, not run");
    }

    let mut processor = TurnProcessor::new(provider, Arc::new(registry), config.clone(), config.clone())
        .with_view_builder(ConversationViewBuilder::from_config(&config.view))
        .with_event_recorder(RuntimeEventRecorder::with_bus(bus))
        .with_plan_recorder(plans.clone())
        .with_tool_loop_policy(config.tool_loop.clone());

    let mut compaction = KeepLastCompactionService::new();
    if let Some(tracker) = FileChangeTracker::from_config(&config.file_changes) {
        compaction = compaction.with_file_changes(tracker.clone());
        processor = processor.with_file_changes(tracker);
    }
    processor = processor.with_compaction(Arc::new(compaction));

    let mut session = Session::new("cli", "demo");
    session.push(Message::user("What time is it?"));
    let mut ctx = TurnContext::new(session).with_tools(definitions);

    let result = processor.process_turn(&mut ctx).await;

    println!("🔄 Events:");
    while let Ok(event) = events_rx.try_recv() {
        let payload = serde_json::Value::Object(event.payload.clone());
        println!("   {:<20} {payload}", serde_json::to_value(event.event_type)?.as_str().unwrap_or("?"));
    }

    println!();
    println!("💬 {}", ctx.final_text().unwrap_or("<no answer>"));
    println!(
        "   outcome: {:?} ({} LLM call(s), {} tool execution(s))",
        result.outcome, result.llm_calls, result.tool_executions
    );

    if plan {
        for step in plans.steps() {
            println!("   planned: {} {}", step.tool_name, serde_json::Value::Object(step.arguments));
        }
    }

    println!();
    println!("📊 Usage:");
    for (model, usage) in tracker.totals_by_model() {
        println!(
            "   {model}: {} prompt + {} completion = {} tokens",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_provider_calls_tool_then_answers() {
        let first = DemoProvider
            .chat(ProviderRequest::new("m", vec![Message::user("time?")]))
            .await
            .unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        assert_eq!(first.tool_calls[0].name, "clock");

        let second = DemoProvider
            .chat(ProviderRequest::new(
                "m",
                vec![
                    Message::user("time?"),
                    Message::tool_result("demo-1", "clock", "noon"),
                ],
            ))
            .await
            .unwrap();
        assert!(!second.has_tool_calls());
        assert_eq!(second.content.as_deref(), Some("The clock tool reported: noon"));
    }
}
