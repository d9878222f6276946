//! # Rivet Core
//!
//! Domain types, traits, and error definitions for the Rivet turn runtime.
//! This crate holds no orchestration logic. It defines the domain model
//! and the collaborator seams the turn loop is written against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of a turn (model client, tool executor, model
//! selector, plan recorder, compaction service, runtime limits) is a trait
//! here. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted stand-ins
//! - Clean dependency graph (all crates depend inward on core)

pub mod code;
pub mod compaction;
pub mod context;
pub mod error;
pub mod event;
pub mod limits;
pub mod message;
pub mod model;
pub mod plan;
pub mod provider;
pub mod response;
pub mod session;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use code::LlmErrorCode;
pub use compaction::{CompactionDetails, CompactionReason, CompactionResult, CompactionService, FileChangeStat};
pub use context::{AttributeKey, Extensions, FailureEvent, FailureKind, FailureSource, TurnContext};
pub use error::{CompactionError, Error, PlanError, ProviderError, Result, ToolError};
pub use event::{EventBus, RuntimeEvent, RuntimeEventType};
pub use limits::{RuntimeLimitsProvider, TurnLimits};
pub use message::{Message, Role};
pub use model::{FixedModelSelector, ModelSelection, ModelSelector, ModelTier};
pub use plan::PlanRecorder;
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use response::{Attachment, AttachmentKind, OutgoingResponse};
pub use session::{InterruptSignal, Session, SessionId};
pub use tool::{Tool, ToolCall, ToolExecutionOutcome, ToolExecutor, ToolFailureKind, ToolRegistry, ToolResult};
pub use turn::{TurnLimitReason, TurnOutcome, TurnResult};
