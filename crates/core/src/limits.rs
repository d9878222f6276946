//! Per-turn resource limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits and retry settings the turn loop reads once at turn start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnLimits {
    pub max_llm_calls: u32,
    pub max_tool_executions: u32,
    pub deadline: Duration,
    pub auto_retry_enabled: bool,
    pub auto_retry_max_attempts: u32,
    pub auto_retry_base_delay: Duration,
    /// Messages kept verbatim when compacting after a context overflow
    pub compaction_keep_last: usize,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            max_llm_calls: 200,
            max_tool_executions: 500,
            deadline: Duration::from_secs(3600),
            auto_retry_enabled: false,
            auto_retry_max_attempts: 0,
            auto_retry_base_delay: Duration::from_millis(500),
            compaction_keep_last: 20,
        }
    }
}

pub trait RuntimeLimitsProvider: Send + Sync {
    fn turn_limits(&self) -> TurnLimits;
}

impl RuntimeLimitsProvider for TurnLimits {
    fn turn_limits(&self) -> TurnLimits {
        self.clone()
    }
}
