//! Keep-last compaction: drop old messages, leave a notice in their place.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use rivet_core::compaction::{CompactionDetails, CompactionReason, CompactionResult, CompactionService};
use rivet_core::error::CompactionError;
use rivet_core::message::{Message, Role};
use rivet_core::session::Session;
use tracing::info;

use crate::file_changes::FileChangeTracker;

/// Keeps the last N messages of a session and replaces the rest with a
/// system notice. No model is involved, so `used_summary` is always false.
///
/// A tool result is never separated from the assistant message that
/// requested it: the cut moves back to that message instead.
#[derive(Debug, Clone, Default)]
pub struct KeepLastCompactionService {
    file_changes: Option<FileChangeTracker>,
}

impl KeepLastCompactionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report file changes found in the dropped messages.
    pub fn with_file_changes(mut self, tracker: FileChangeTracker) -> Self {
        self.file_changes = Some(tracker);
        self
    }

    fn split_point(messages: &[Message], keep_last: usize) -> usize {
        let mut split = messages.len().saturating_sub(keep_last);
        // The latest user message is what the turn answers; it always stays.
        if let Some(last_user) = messages.iter().rposition(|m| m.role == Role::User) {
            split = split.min(last_user);
        }
        while split > 0 && split < messages.len() && messages[split].role == Role::Tool {
            split -= 1;
        }
        split
    }
}

#[async_trait]
impl CompactionService for KeepLastCompactionService {
    async fn compact(
        &self,
        session: &mut Session,
        reason: CompactionReason,
        keep_last: usize,
    ) -> Result<CompactionResult, CompactionError> {
        let total = session.messages.len();
        let split = Self::split_point(&session.messages, keep_last);
        if split == 0 {
            return Err(CompactionError::NothingToCompact { total, keep_last });
        }

        let removed: Vec<Message> = session.messages.drain(..split).collect();
        let kept = session.messages.len();

        let tool_names: Vec<String> = removed
            .iter()
            .flat_map(|m| m.tool_calls.iter().map(|c| c.name.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let file_changes = self
            .file_changes
            .as_ref()
            .map(|t| t.summarize_messages(&removed))
            .unwrap_or_default();

        let mut notice = format!(
            "[Compacted] {} earlier message(s) were removed to free context space.",
            removed.len()
        );
        if !tool_names.is_empty() {
            notice.push_str(&format!(" Tools used: {}.", tool_names.join(", ")));
        }
        let summary = Message::system(notice).with_metadata("compaction", true);
        session.messages.insert(0, summary.clone());
        session.updated_at = Utc::now();

        info!(
            session_id = %session.id,
            removed = removed.len(),
            kept,
            ?reason,
            "Session compacted"
        );

        Ok(CompactionResult {
            removed: removed.len(),
            used_summary: false,
            summary_message: Some(summary),
            details: Some(CompactionDetails {
                reason,
                removed: removed.len(),
                kept,
                tool_names,
                file_changes,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::tool::ToolCall;
    use serde_json::json;

    fn session_with(messages: Vec<Message>) -> Session {
        let mut session = Session::new("cli", "local");
        for m in messages {
            session.push(m);
        }
        session
    }

    fn chat(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| if i % 2 == 0 { Message::user(format!("q{i}")) } else { Message::assistant(format!("a{i}")) })
            .collect()
    }

    #[tokio::test]
    async fn keeps_last_and_inserts_notice() {
        let mut session = session_with(chat(8));
        let result = KeepLastCompactionService::new()
            .compact(&mut session, CompactionReason::ContextOverflowRecovery, 2)
            .await
            .unwrap();

        assert_eq!(result.removed, 6);
        assert!(!result.used_summary);
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[0].role, Role::System);
        assert!(session.messages[0].text().starts_with("[Compacted] 6 earlier"));
        assert_eq!(session.messages[2].text(), "a7");

        let details = result.details.unwrap();
        assert_eq!(details.kept, 2);
        assert_eq!(details.reason, CompactionReason::ContextOverflowRecovery);
    }

    #[tokio::test]
    async fn never_splits_tool_group() {
        let call = ToolCall::new("c1", "shell", serde_json::Map::new());
        let mut session = session_with(vec![
            Message::user("q"),
            Message::assistant("a"),
            Message::user("run it"),
            Message::assistant_tool_calls(None, vec![call]),
            Message::tool_result("c1", "shell", "done"),
            Message::assistant("it ran"),
            Message::user("thanks"),
        ]);
        let result = KeepLastCompactionService::new()
            .compact(&mut session, CompactionReason::Manual, 3)
            .await
            .unwrap();

        // the cut moved back from the tool result to its assistant message
        assert_eq!(result.removed, 3);
        assert!(session.messages[1].has_tool_calls());
        assert!(session.messages[2].is_tool_result());
    }

    #[tokio::test]
    async fn latest_user_message_survives_zero_keep_last() {
        let mut session = session_with(vec![
            Message::user("old question"),
            Message::assistant("old answer"),
            Message::user("current question"),
            Message::assistant("thinking out loud"),
        ]);
        let result = KeepLastCompactionService::new()
            .compact(&mut session, CompactionReason::ContextOverflowRecovery, 0)
            .await
            .unwrap();

        assert_eq!(result.removed, 2);
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].role, Role::User);
        assert_eq!(session.messages[1].text(), "current question");
    }

    #[tokio::test]
    async fn nothing_to_compact() {
        let mut session = session_with(chat(2));
        let err = KeepLastCompactionService::new()
            .compact(&mut session, CompactionReason::Manual, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, CompactionError::NothingToCompact { total: 2, keep_last: 5 }));
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn details_list_tools_and_file_changes() {
        let write = ToolCall::new(
            "c1",
            "filesystem",
            json!({"operation": "write_file", "path": "a.txt", "content": "x\ny"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let mut messages = vec![
            Message::user("write it"),
            Message::assistant_tool_calls(None, vec![write]),
            Message::tool_result("c1", "filesystem", "ok"),
        ];
        messages.extend(chat(2));
        let mut session = session_with(messages);

        let service = KeepLastCompactionService::new().with_file_changes(FileChangeTracker::new("filesystem", "."));
        let details = service
            .compact(&mut session, CompactionReason::Manual, 2)
            .await
            .unwrap()
            .details
            .unwrap();

        assert_eq!(details.tool_names, vec!["filesystem"]);
        assert_eq!(details.file_changes.len(), 1);
        assert_eq!(details.file_changes[0].added_lines, 2);
        assert!(session.messages[0].text().contains("Tools used: filesystem."));
    }
}
