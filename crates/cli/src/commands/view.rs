//! `rivet view`: Render what the model would see for a transcript.

use std::path::Path;

use rivet_agent::{ConversationView, ConversationViewBuilder, MaskingPolicy};
use rivet_config::AppConfig;
use rivet_core::message::Message;
use rivet_core::session::Session;

/// Accepts either a serialized session or a bare message array.
fn parse_transcript(raw: &str) -> Result<Vec<Message>, serde_json::Error> {
    match serde_json::from_str::<Session>(raw) {
        Ok(session) => Ok(session.messages),
        Err(_) => serde_json::from_str::<Vec<Message>>(raw),
    }
}

fn render(view: &ConversationView) -> String {
    let mut out = String::new();
    for msg in &view.messages {
        let role = serde_json::to_value(msg.role)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        out.push_str(&format!("[{role}] {}\n", msg.text()));
        for call in &msg.tool_calls {
            out.push_str(&format!("    -> {} ({})\n", call.name, call.id));
        }
    }
    out
}

pub async fn run(transcript: &Path, flatten: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let raw = tokio::fs::read_to_string(transcript)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", transcript.display()))?;
    let messages = parse_transcript(&raw)?;
    tracing::debug!(messages = messages.len(), flatten, "Loaded transcript");

    let policy = if flatten {
        MaskingPolicy::MaskBefore(messages.len())
    } else {
        MaskingPolicy::Preserve
    };
    let view = ConversationViewBuilder::from_config(&config.view).build_view(&messages, policy);

    print!("{}", render(&view));
    if !view.diagnostics.is_empty() {
        println!();
        for note in &view.diagnostics {
            println!("   ℹ️  {note}");
        }
    }
    Ok(())
}
