use crate::error::ConfigError;
use crate::planner::{DEFAULT_MAX_RETRIES, DEFAULT_STEP_DURATION_SECS, DanglingPolicy};
use crate::safety::RiskLevel;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound accepted for `planner.default_max_retries`.
const MAX_RETRIES_LIMIT: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XingConfig {
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    #[serde(skip)]
    pub config_path: PathBuf,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub learning: LearningConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Seconds assumed for a step the model gave no estimate for.
    #[serde(default = "default_step_duration_secs")]
    pub default_step_duration_secs: u64,
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    #[serde(default)]
    pub dangling_policy: DanglingPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_true")]
    pub retry_failed_steps: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_safety_level")]
    pub level: RiskLevel,
    #[serde(default)]
    pub auto_approve_safe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Relative paths resolve against the directory holding `config.toml`.
    #[serde(default = "default_knowledge_file")]
    pub knowledge_file: PathBuf,
}

fn default_step_duration_secs() -> u64 {
    DEFAULT_STEP_DURATION_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_true() -> bool {
    true
}

fn default_safety_level() -> RiskLevel {
    RiskLevel::High
}

fn default_knowledge_file() -> PathBuf {
    PathBuf::from("knowledge.jsonl")
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_step_duration_secs: default_step_duration_secs(),
            default_max_retries: default_max_retries(),
            dangling_policy: DanglingPolicy::default(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry_failed_steps: true,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            level: default_safety_level(),
            auto_approve_safe: false,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            knowledge_file: default_knowledge_file(),
        }
    }
}

impl Default for XingConfig {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let xing_dir = home.join(".xing");

        Self {
            workspace_dir: xing_dir.join("workspace"),
            config_path: xing_dir.join("config.toml"),
            planner: PlannerConfig::default(),
            executor: ExecutorConfig::default(),
            safety: SafetyConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl XingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.planner.default_step_duration_secs == 0 {
            return Err(ConfigError::Validation(
                "planner.default_step_duration_secs must be greater than 0".to_string(),
            ));
        }
        if self.planner.default_max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Validation(format!(
                "planner.default_max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.planner.default_max_retries
            )));
        }
        if self.learning.knowledge_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "learning.knowledge_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute location of the JSONL knowledge file.
    pub fn knowledge_path(&self) -> PathBuf {
        if self.learning.knowledge_file.is_absolute() {
            return self.learning.knowledge_file.clone();
        }
        self.config_path
            .parent()
            .map_or_else(
                || self.learning.knowledge_file.clone(),
                |dir| dir.join(&self.learning.knowledge_file),
            )
    }
}
