use super::XingConfig;
use crate::safety::RiskLevel;
use std::path::PathBuf;

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl XingConfig {
    /// Environment variables win over the file. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("XING_SAFETY_LEVEL")
            && let Ok(level) = level.trim().parse::<RiskLevel>()
        {
            self.safety.level = level;
        }

        if let Ok(flag) = std::env::var("XING_AUTO_APPROVE_SAFE")
            && let Some(flag) = parse_bool(&flag)
        {
            self.safety.auto_approve_safe = flag;
        }

        if let Ok(flag) = std::env::var("XING_LEARNING_ENABLED")
            && let Some(flag) = parse_bool(&flag)
        {
            self.learning.enabled = flag;
        }

        if let Ok(retries) = std::env::var("XING_MAX_RETRIES")
            && let Ok(retries) = retries.trim().parse::<u32>()
        {
            self.planner.default_max_retries = retries;
        }

        if let Ok(workspace) = std::env::var("XING_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace_dir = PathBuf::from(workspace);
        }
    }
}
