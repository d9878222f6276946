//! Terminal states of a turn.

use serde::{Deserialize, Serialize};

use crate::code::LlmErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnLimitReason {
    MaxLlmCalls,
    MaxToolExecutions,
    DeadlineExceeded,
}

impl TurnLimitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxLlmCalls => "MAX_LLM_CALLS",
            Self::MaxToolExecutions => "MAX_TOOL_EXECUTIONS",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }
}

/// How a turn ended. Exactly one of these holds for every turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced a final answer.
    FinalAnswer,
    /// A tool-loop policy stopped the turn; a stop notice is the answer.
    Stopped { reason: String },
    /// A resource limit ended the turn.
    LimitReached(TurnLimitReason),
    /// The model call failed for good, or never produced an answer.
    Failed { code: LlmErrorCode },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub final_answer_ready: bool,
    pub llm_calls: u32,
    pub tool_executions: u32,
    pub outcome: TurnOutcome,
}

impl TurnResult {
    pub fn limit_reason(&self) -> Option<TurnLimitReason> {
        match self.outcome {
            TurnOutcome::LimitReached(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<&LlmErrorCode> {
        match &self.outcome {
            TurnOutcome::Failed { code } => Some(code),
            _ => None,
        }
    }
}
