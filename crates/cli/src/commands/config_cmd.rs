//! `rivet config`: Configuration management commands.

use rivet_config::{AppConfig, MaskingMode};
use rivet_core::model::ModelSelector;

/// Non-fatal problems worth pointing out.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.turn.auto_retry.enabled || config.turn.auto_retry.max_attempts == 0 {
        warnings.push("Auto-retry is off: rate limits and timeouts end the turn".to_string());
    }
    if config.view.max_messages > 0 && config.view.max_messages <= config.compaction.keep_last_messages {
        warnings.push(format!(
            "view.max_messages ({}) is not above compaction.keep_last_messages ({})",
            config.view.max_messages, config.compaction.keep_last_messages
        ));
    }
    if config.tool_loop.stop_on_tool_failure {
        warnings.push("stop_on_tool_failure is on: the model cannot recover from a failed tool".to_string());
    }
    warnings
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            let default = config.resolve_for_tier(None);
            println!();
            println!("   Default tier:  {} ({})", config.models.default_tier, default.model);
            println!(
                "   Limits:        {} LLM calls, {} tool executions, {}s",
                config.turn.max_llm_calls, config.turn.max_tool_executions, config.turn.deadline_secs
            );
            println!(
                "   Auto-retry:    {} (max {}, base {}ms)",
                config.turn.auto_retry.enabled, config.turn.auto_retry.max_attempts, config.turn.auto_retry.base_delay_ms
            );
            println!(
                "   View:          {}",
                match config.view.masking {
                    MaskingMode::Flatten => "flatten",
                    MaskingMode::Passthrough => "passthrough",
                }
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
