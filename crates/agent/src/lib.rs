//! The turn loop: the heart of Rivet.
//!
//! A turn follows a **View → Call → Act** cycle:
//!
//! 1. **Build the view** of the conversation the model should see
//! 2. **Call the model** through the configured provider, retrying
//!    transient failures and compacting once on context overflow
//! 3. **If tool calls**: run them in order, record results, loop back to 1
//! 4. **If text**: write the final answer to history
//!
//! The loop ends with a final answer, a limit stop (LLM calls, tool
//! executions, deadline) or a recorded failure.

pub mod compaction;
pub mod error_classifier;
pub mod events;
pub mod file_changes;
pub mod history;
pub mod plan;
pub mod turn;
pub mod view;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use compaction::KeepLastCompactionService;
pub use error_classifier::{PHRASE_RULES, PhraseRule, classify_empty_response, classify_error, classify_message};
pub use events::RuntimeEventRecorder;
pub use file_changes::{FileChangeTracker, FileOperation};
pub use history::{DefaultHistoryWriter, HistoryWriter};
pub use plan::{InMemoryPlanRecorder, PlanStep};
pub use turn::{EMPTY_FINAL_RESPONSE_MAX_RETRIES, TurnProcessor, retry_delay};
pub use view::{
    ConversationView, ConversationViewBuilder, FlatteningMasker, MaskingPolicy, PassthroughMasker,
    ToolMessageMasker,
};
