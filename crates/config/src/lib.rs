//! Configuration loading, validation, and management for Rivet.
//!
//! Loads configuration from `~/.rivet/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use rivet_core::limits::{RuntimeLimitsProvider, TurnLimits};
use rivet_core::model::{ModelSelection, ModelSelector, ModelTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.rivet/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Turn limits and auto-retry
    #[serde(default)]
    pub turn: TurnConfig,

    /// When the tool loop stops early
    #[serde(default)]
    pub tool_loop: ToolLoopConfig,

    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Tier → model mapping
    #[serde(default)]
    pub models: ModelsConfig,

    /// How conversation history is projected for the model
    #[serde(default)]
    pub view: ViewConfig,

    /// Per-turn file change accounting
    #[serde(default)]
    pub file_changes: FileChangesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    #[serde(default = "default_max_llm_calls")]
    pub max_llm_calls: u32,

    #[serde(default = "default_max_tool_executions")]
    pub max_tool_executions: u32,

    /// Wall-clock budget for one turn
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    #[serde(default)]
    pub auto_retry: AutoRetryConfig,
}

fn default_max_llm_calls() -> u32 {
    200
}
fn default_max_tool_executions() -> u32 {
    500
}
fn default_deadline_secs() -> u64 {
    3600
}
fn default_true() -> bool {
    true
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_llm_calls: default_max_llm_calls(),
            max_tool_executions: default_max_tool_executions(),
            deadline_secs: default_deadline_secs(),
            auto_retry: AutoRetryConfig::default(),
        }
    }
}

/// Retry of transient provider failures (rate limits, timeouts, 5xx).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubles per attempt, capped at 3s
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_retry_max_attempts() -> u32 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for AutoRetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_retry_max_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolLoopConfig {
    #[serde(default)]
    pub stop_on_tool_failure: bool,

    #[serde(default = "default_true")]
    pub stop_on_confirmation_denied: bool,

    #[serde(default)]
    pub stop_on_tool_policy_denied: bool,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            stop_on_tool_failure: false,
            stop_on_confirmation_denied: true,
            stop_on_tool_policy_denied: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Messages kept verbatim when compacting after a context overflow
    #[serde(default = "default_keep_last_messages")]
    pub keep_last_messages: usize,
}

fn default_keep_last_messages() -> usize {
    20
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            keep_last_messages: default_keep_last_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub default_tier: ModelTier,

    /// Keyed by tier name ("default", "smart", "coding", "deep")
    #[serde(default = "default_tiers")]
    pub tiers: BTreeMap<String, TierConfig>,
}

/// Used when the default tier itself is not configured.
const FALLBACK_MODEL: &str = "gpt-4o-mini";

fn default_tiers() -> BTreeMap<String, TierConfig> {
    let tier = |model: &str, reasoning: Option<&str>| TierConfig {
        model: model.into(),
        reasoning_effort: reasoning.map(Into::into),
    };
    BTreeMap::from([
        ("default".to_string(), tier(FALLBACK_MODEL, None)),
        ("smart".to_string(), tier("gpt-4o", Some("medium"))),
        ("coding".to_string(), tier("gpt-4o", Some("medium"))),
        ("deep".to_string(), tier("o3", Some("high"))),
    ])
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default_tier: ModelTier::Default,
            tiers: default_tiers(),
        }
    }
}

impl ModelsConfig {
    fn tier(&self, tier: ModelTier) -> Option<&TierConfig> {
        self.tiers.get(tier.as_str())
    }
}

impl ModelSelector for ModelsConfig {
    fn resolve_for_tier(&self, tier: Option<ModelTier>) -> ModelSelection {
        let configured = tier
            .and_then(|t| self.tier(t))
            .or_else(|| self.tier(self.default_tier));

        match configured {
            Some(tc) => ModelSelection {
                model: tc.model.clone(),
                reasoning_effort: tc.reasoning_effort.clone(),
            },
            None => {
                tracing::warn!(tier = ?tier, "No model configured for tier or default tier, using fallback model");
                ModelSelection::new(FALLBACK_MODEL)
            }
        }
    }
}

/// Which masking strategy the conversation view applies to tool history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskingMode {
    /// Collapse tool-call/tool-result pairs into narrative text
    #[default]
    Flatten,
    /// Never rewrite tool history
    Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub masking: MaskingMode,

    /// Maximum messages sent to the model (0 = unlimited)
    #[serde(default)]
    pub max_messages: usize,

    #[serde(default = "default_flatten_max_args_chars")]
    pub flatten_max_args_chars: usize,

    #[serde(default = "default_flatten_max_result_chars")]
    pub flatten_max_result_chars: usize,
}

fn default_flatten_max_args_chars() -> usize {
    200
}
fn default_flatten_max_result_chars() -> usize {
    2000
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            masking: MaskingMode::Flatten,
            max_messages: 0,
            flatten_max_args_chars: default_flatten_max_args_chars(),
            flatten_max_result_chars: default_flatten_max_result_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Name of the filesystem-style tool whose writes are tracked
    #[serde(default = "default_fs_tool_name")]
    pub tool_name: String,

    /// Relative tool paths resolve against this directory
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
}

fn default_fs_tool_name() -> String {
    "filesystem".into()
}
fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for FileChangesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tool_name: default_fs_tool_name(),
            workspace_root: default_workspace_root(),
        }
    }
}

impl RuntimeLimitsProvider for AppConfig {
    fn turn_limits(&self) -> TurnLimits {
        let retry = &self.turn.auto_retry;
        TurnLimits {
            max_llm_calls: self.turn.max_llm_calls,
            max_tool_executions: self.turn.max_tool_executions,
            deadline: Duration::from_secs(self.turn.deadline_secs),
            auto_retry_enabled: retry.enabled,
            auto_retry_max_attempts: retry.max_attempts,
            auto_retry_base_delay: Duration::from_millis(retry.base_delay_ms.max(1)),
            compaction_keep_last: self.compaction.keep_last_messages,
        }
    }
}

impl ModelSelector for AppConfig {
    fn resolve_for_tier(&self, tier: Option<ModelTier>) -> ModelSelection {
        self.models.resolve_for_tier(tier)
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.rivet/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `RIVET_MAX_LLM_CALLS`
    /// - `RIVET_MAX_TOOL_EXECUTIONS`
    /// - `RIVET_DEFAULT_TIER`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = var("RIVET_MAX_LLM_CALLS") {
            self.turn.max_llm_calls = parse_env("RIVET_MAX_LLM_CALLS", &raw)?;
        }
        if let Some(raw) = var("RIVET_MAX_TOOL_EXECUTIONS") {
            self.turn.max_tool_executions = parse_env("RIVET_MAX_TOOL_EXECUTIONS", &raw)?;
        }
        if let Some(raw) = var("RIVET_DEFAULT_TIER") {
            self.models.default_tier = raw.parse().map_err(ConfigError::ValidationError)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rivet")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turn.max_llm_calls == 0 {
            return Err(ConfigError::ValidationError("turn.max_llm_calls must be >= 1".into()));
        }
        if self.turn.max_tool_executions == 0 {
            return Err(ConfigError::ValidationError(
                "turn.max_tool_executions must be >= 1".into(),
            ));
        }
        if self.turn.deadline_secs == 0 {
            return Err(ConfigError::ValidationError("turn.deadline_secs must be >= 1".into()));
        }
        if self.turn.auto_retry.base_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "turn.auto_retry.base_delay_ms must be >= 1".into(),
            ));
        }
        if self.compaction.keep_last_messages == 0 {
            return Err(ConfigError::ValidationError(
                "compaction.keep_last_messages must be >= 1".into(),
            ));
        }
        if self.models.tier(self.models.default_tier).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "models.default_tier '{}' has no entry in models.tiers",
                self.models.default_tier
            )));
        }
        if self.file_changes.enabled && self.file_changes.tool_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "file_changes.tool_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("{key} must be a number: {e}")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.turn.max_llm_calls, 200);
        assert_eq!(config.turn.max_tool_executions, 500);
        assert!(config.tool_loop.stop_on_confirmation_denied);
        assert!(!config.tool_loop.stop_on_tool_policy_denied);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.turn.deadline_secs, config.turn.deadline_secs);
        assert_eq!(parsed.models.tiers.len(), 4);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[turn]
max_llm_calls = 3

[turn.auto_retry]
enabled = false

[view]
masking = "passthrough"
"#,
        )
        .unwrap();
        assert_eq!(config.turn.max_llm_calls, 3);
        assert_eq!(config.turn.max_tool_executions, 500);
        assert!(!config.turn.auto_retry.enabled);
        assert_eq!(config.turn.auto_retry.base_delay_ms, 500);
        assert_eq!(config.view.masking, MaskingMode::Passthrough);
        assert_eq!(config.compaction.keep_last_messages, 20);
    }

    #[test]
    fn zero_llm_calls_rejected() {
        let mut config = AppConfig::default();
        config.turn.max_llm_calls = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_keep_last_rejected() {
        let mut config = AppConfig::default();
        config.compaction.keep_last_messages = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("keep_last_messages"));
    }

    #[test]
    fn unconfigured_default_tier_rejected() {
        let mut config = AppConfig::default();
        config.models.tiers.remove("default");
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.turn.max_llm_calls, 200);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[turn\nmax_llm_calls = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn file_values_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[turn]\nmax_tool_executions = 0\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RIVET_MAX_LLM_CALLS", "7"),
            ("RIVET_DEFAULT_TIER", "smart"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.turn.max_llm_calls, 7);
        assert_eq!(config.models.default_tier, ModelTier::Smart);
    }

    #[test]
    fn bad_env_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(|k| (k == "RIVET_MAX_LLM_CALLS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("RIVET_MAX_LLM_CALLS"));
    }

    #[test]
    fn limits_follow_config() {
        let mut config = AppConfig::default();
        config.turn.deadline_secs = 30;
        config.compaction.keep_last_messages = 4;
        let limits = config.turn_limits();
        assert_eq!(limits.deadline, Duration::from_secs(30));
        assert_eq!(limits.compaction_keep_last, 4);
        assert!(limits.auto_retry_enabled);
        assert_eq!(limits.auto_retry_base_delay, Duration::from_millis(500));
    }

    #[test]
    fn tier_resolution_falls_back_to_default_tier() {
        let mut models = ModelsConfig::default();
        models.tiers.remove("coding");

        let smart = models.resolve_for_tier(Some(ModelTier::Smart));
        assert_eq!(smart.model, "gpt-4o");
        assert_eq!(smart.reasoning_effort.as_deref(), Some("medium"));

        let coding = models.resolve_for_tier(Some(ModelTier::Coding));
        assert_eq!(coding.model, FALLBACK_MODEL);

        let none = models.resolve_for_tier(None);
        assert_eq!(none.model, FALLBACK_MODEL);
        assert!(none.reasoning_effort.is_none());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_llm_calls"));
        assert!(toml_str.contains("gpt-4o"));
    }
}
