//! Plan capture: while a plan is being drafted, tool calls are recorded
//! as plan steps instead of being executed.

use async_trait::async_trait;

use crate::error::PlanError;

#[async_trait]
pub trait PlanRecorder: Send + Sync {
    fn is_plan_mode_active(&self) -> bool;

    fn active_plan_id(&self) -> Option<String>;

    async fn add_step(
        &self,
        plan_id: &str,
        tool_name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
        description: &str,
    ) -> Result<(), PlanError>;
}
