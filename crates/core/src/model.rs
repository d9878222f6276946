//! Model tiers and the selector that resolves them to concrete models.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A named model-selection bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    #[default]
    Default,
    Smart,
    Coding,
    Deep,
}

impl ModelTier {
    pub const ALL: [ModelTier; 4] = [Self::Default, Self::Smart, Self::Coding, Self::Deep];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Smart => "smart",
            Self::Coding => "coding",
            Self::Deep => "deep",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown model tier: {s}"))
    }
}

/// A resolved model and its reasoning hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

impl ModelSelection {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reasoning_effort: None,
        }
    }

    pub fn with_reasoning(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }
}

/// Resolves a tier to a model. A missing or unconfigured tier falls back
/// to the selector's default tier.
pub trait ModelSelector: Send + Sync {
    fn resolve_for_tier(&self, tier: Option<ModelTier>) -> ModelSelection;
}

/// Always answers with the same model.
#[derive(Debug, Clone)]
pub struct FixedModelSelector(pub ModelSelection);

impl ModelSelector for FixedModelSelector {
    fn resolve_for_tier(&self, _tier: Option<ModelTier>) -> ModelSelection {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("Smart".parse::<ModelTier>().unwrap(), ModelTier::Smart);
        assert_eq!(" deep ".parse::<ModelTier>().unwrap(), ModelTier::Deep);
        assert!("turbo".parse::<ModelTier>().is_err());
    }

    #[test]
    fn tier_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ModelTier::Coding).unwrap(), "\"coding\"");
    }

    #[test]
    fn fixed_selector_ignores_tier() {
        let selector = FixedModelSelector(ModelSelection::new("m1").with_reasoning("low"));
        let sel = selector.resolve_for_tier(Some(ModelTier::Deep));
        assert_eq!(sel.model, "m1");
        assert_eq!(sel.reasoning_effort.as_deref(), Some("low"));
    }
}
