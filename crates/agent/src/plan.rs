//! In-memory plan capture.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rivet_core::error::PlanError;
use rivet_core::plan::PlanRecorder;
use serde::Serialize;
use uuid::Uuid;

/// One tool call captured instead of executed.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub plan_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PlanState {
    active_plan: Option<String>,
    steps: Vec<PlanStep>,
}

/// A [`PlanRecorder`] that keeps steps in memory.
///
/// Plan mode is on while a plan is active. Steps for any plan other than
/// the active one are rejected.
#[derive(Debug, Default)]
pub struct InMemoryPlanRecorder {
    state: Mutex<PlanState>,
}

impl InMemoryPlanRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new plan and turn plan mode on. Returns the plan id.
    pub fn activate(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock().active_plan = Some(id.clone());
        id
    }

    /// Turn plan mode off. Recorded steps are kept.
    pub fn deactivate(&self) {
        self.lock().active_plan = None;
    }

    pub fn steps(&self) -> Vec<PlanStep> {
        self.lock().steps.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PlanState> {
        // A poisoned lock still holds consistent data: every write is a
        // single push or assignment.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PlanRecorder for InMemoryPlanRecorder {
    fn is_plan_mode_active(&self) -> bool {
        self.lock().active_plan.is_some()
    }

    fn active_plan_id(&self) -> Option<String> {
        self.lock().active_plan.clone()
    }

    async fn add_step(
        &self,
        plan_id: &str,
        tool_name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
        description: &str,
    ) -> Result<(), PlanError> {
        let mut state = self.lock();
        match state.active_plan.as_deref() {
            Some(active) if active == plan_id => {}
            Some(_) => return Err(PlanError::Closed(plan_id.to_string())),
            None => return Err(PlanError::NotFound(plan_id.to_string())),
        }
        state.steps.push(PlanStep {
            plan_id: plan_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments: arguments.clone(),
            description: description.to_string(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}
