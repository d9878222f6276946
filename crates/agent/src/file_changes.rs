//! Per-turn file-change accounting for the filesystem tool.
//!
//! Line deltas come from comparing line counts before and after a change.
//! They are an approximation, not a diff.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rivet_config::FileChangesConfig;
use rivet_core::compaction::FileChangeStat;
use rivet_core::context::TurnContext;
use rivet_core::message::{Message, Role};
use rivet_core::tool::ToolCall;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Write,
    Append,
    Delete,
}

impl FileOperation {
    pub fn parse(operation: &str) -> Option<Self> {
        match operation.trim() {
            "write_file" => Some(Self::Write),
            "append_file" => Some(Self::Append),
            "delete" | "delete_file" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A change captured before the tool runs, committed once it succeeds.
#[derive(Debug, Clone)]
pub struct PendingFileChange {
    pub path: String,
    pub operation: FileOperation,
    before_lines: u64,
    content_lines: u64,
}

impl PendingFileChange {
    fn to_stat(&self) -> FileChangeStat {
        let mut stat = FileChangeStat::new(&self.path);
        match self.operation {
            FileOperation::Write => {
                stat.added_lines = self.content_lines.saturating_sub(self.before_lines);
                stat.removed_lines = self.before_lines.saturating_sub(self.content_lines);
            }
            FileOperation::Append => stat.added_lines = self.content_lines,
            FileOperation::Delete => {
                stat.removed_lines = self.before_lines;
                stat.deleted = true;
            }
        }
        stat
    }
}

#[derive(Debug, Clone)]
pub struct FileChangeTracker {
    tool_name: String,
    workspace_root: PathBuf,
}

impl FileChangeTracker {
    pub fn new(tool_name: impl Into<String>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            tool_name: tool_name.into(),
            workspace_root: workspace_root.into(),
        }
    }

    /// `None` when file-change capture is disabled.
    pub fn from_config(config: &FileChangesConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.tool_name.clone(), config.workspace_root.clone()))
    }

    /// The operation and path of a call this tracker cares about.
    pub fn classify<'a>(&self, call: &'a ToolCall) -> Option<(FileOperation, &'a str)> {
        if call.name != self.tool_name {
            return None;
        }
        let operation = FileOperation::parse(call.str_arg("operation")?)?;
        let path = call.str_arg("path").map(str::trim).filter(|p| !p.is_empty())?;
        Some((operation, path))
    }

    /// Snapshot what the call is about to change. Reads the current file,
    /// so this must run before the tool does.
    pub async fn prepare(&self, call: &ToolCall) -> Option<PendingFileChange> {
        let (operation, path) = self.classify(call)?;
        let before_lines = match tokio::fs::read_to_string(self.resolve(path)).await {
            Ok(existing) => count_lines(&existing),
            Err(_) => 0,
        };
        let content_lines = call.str_arg("content").map(count_lines).unwrap_or(0);
        Some(PendingFileChange {
            path: path.to_string(),
            operation,
            before_lines,
            content_lines,
        })
    }

    /// Fold a successful change into the turn's stats, one entry per path.
    pub fn record(&self, ctx: &mut TurnContext, pending: &PendingFileChange) {
        let stat = pending.to_stat();
        debug!(path = %stat.path, added = stat.added_lines, removed = stat.removed_lines, "File change recorded");
        merge_stat(&mut ctx.file_changes, stat);
    }

    /// Stats for the successful file changes found in a stretch of history.
    /// Prior file contents are unknown here, so writes count all their
    /// lines as added.
    pub fn summarize_messages(&self, messages: &[Message]) -> Vec<FileChangeStat> {
        let failed: HashSet<&str> = messages
            .iter()
            .filter(|m| m.role == Role::Tool && m.text().starts_with("Error:"))
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        let mut stats = Vec::new();
        for call in messages.iter().flat_map(|m| m.tool_calls.iter()) {
            if failed.contains(call.id.as_str()) {
                continue;
            }
            let Some((operation, path)) = self.classify(call) else {
                continue;
            };
            let pending = PendingFileChange {
                path: path.to_string(),
                operation,
                before_lines: 0,
                content_lines: call.str_arg("content").map(count_lines).unwrap_or(0),
            };
            merge_stat(&mut stats, pending.to_stat());
        }
        stats
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

/// Fold `stat` into the entry for its path, keeping one entry per path.
pub(crate) fn merge_stat(stats: &mut Vec<FileChangeStat>, stat: FileChangeStat) {
    match stats.iter_mut().find(|s| s.path == stat.path) {
        Some(existing) => {
            existing.added_lines += stat.added_lines;
            existing.removed_lines += stat.removed_lines;
            existing.deleted = stat.deleted;
        }
        None => stats.push(stat),
    }
}

pub fn count_lines(text: &str) -> u64 {
    text.lines().count() as u64
}
