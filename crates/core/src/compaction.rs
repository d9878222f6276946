//! Compaction: replacing older messages with a shorter summary.
//!
//! How the summary is produced is up to the implementation. The turn loop
//! only calls [`CompactionService::compact`] inline when a model call failed
//! because the context window overflowed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompactionError;
use crate::message::Message;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionReason {
    ContextOverflowRecovery,
    Manual,
}

/// Approximate change to one file within a turn or compacted span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeStat {
    pub path: String,
    pub added_lines: u64,
    pub removed_lines: u64,
    pub deleted: bool,
}

impl FileChangeStat {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionDetails {
    pub reason: CompactionReason,
    pub removed: usize,
    pub kept: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_changes: Vec<FileChangeStat>,
}

#[derive(Debug, Clone)]
pub struct CompactionResult {
    pub removed: usize,
    pub used_summary: bool,
    pub summary_message: Option<Message>,
    pub details: Option<CompactionDetails>,
}

#[async_trait]
pub trait CompactionService: Send + Sync {
    /// Compact `session.messages` in place, keeping the last `keep_last`
    /// messages (or slightly more, to avoid splitting a tool exchange).
    async fn compact(
        &self,
        session: &mut Session,
        reason: CompactionReason,
        keep_last: usize,
    ) -> Result<CompactionResult, CompactionError>;
}
