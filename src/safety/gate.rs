use crate::planner::PlanStep;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskCategory {
    DataAccess,
    SystemModification,
    NetworkAccess,
    CodeExecution,
    FileOperations,
    ExternalCommunication,
}

/// Verdict for one step. Produced per check, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyResult {
    pub approved: bool,
    pub risk_level: RiskLevel,
    pub risk_categories: BTreeSet<RiskCategory>,
    pub reason: String,
    pub requires_human_approval: bool,
    pub suggested_modifications: Vec<String>,
}

impl SafetyResult {
    pub fn approve(reason: impl Into<String>) -> Self {
        Self {
            approved: true,
            risk_level: RiskLevel::Low,
            risk_categories: BTreeSet::new(),
            reason: reason.into(),
            requires_human_approval: false,
            suggested_modifications: Vec::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            ..Self::approve(reason)
        }
    }

    /// What a gate that could not reach a verdict must be treated as.
    pub fn fail_safe(error: &anyhow::Error) -> Self {
        Self {
            approved: false,
            risk_level: RiskLevel::High,
            risk_categories: BTreeSet::new(),
            reason: format!("Safety check failed: {error:#}"),
            requires_human_approval: true,
            suggested_modifications: Vec::new(),
        }
    }
}

#[async_trait]
pub trait SafetyGate: Send + Sync {
    /// An `Err` is never propagated by callers: it is converted with
    /// [`SafetyResult::fail_safe`].
    async fn check(&self, step: &PlanStep) -> anyhow::Result<SafetyResult>;
}

/// Approves every step. For trusted, fully sandboxed setups only.
pub struct AllowAllGate;

#[async_trait]
impl SafetyGate for AllowAllGate {
    async fn check(&self, _step: &PlanStep) -> anyhow::Result<SafetyResult> {
        Ok(SafetyResult::approve("Action approved"))
    }
}

const SYSTEM_PATHS: &[&str] = &["/etc", "/sys", "/proc", "/boot", "C:\\Windows", "C:\\System32"];
const EXECUTABLE_EXTENSIONS: &[&str] = &[".exe", ".bat", ".sh", ".cmd", ".com", ".scr"];
const DANGEROUS_CODE: &[&str] = &[
    "import os",
    "import subprocess",
    "import sys",
    "exec(",
    "eval(",
    "__import__",
    "open(",
    "file(",
    "input(",
    "rm ",
    "del ",
    "rmdir",
];
const RISKY_KEYWORDS: &[(&str, &str)] = &[
    ("delete", "destructive_action"),
    ("remove", "destructive_action"),
    ("modify", "modification_action"),
    ("install", "system_modification"),
    ("download", "network_action"),
    ("execute", "execution_action"),
    ("run", "execution_action"),
];

/// Approval rules switched on by the configured safety level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SafetyRules {
    require_approval_for_file_write: bool,
    require_approval_for_code_execution: bool,
}

impl SafetyRules {
    fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low | RiskLevel::Medium => Self::default(),
            RiskLevel::High | RiskLevel::Critical => Self {
                require_approval_for_file_write: true,
                require_approval_for_code_execution: true,
            },
        }
    }
}

#[derive(Debug, Default)]
struct RiskAssessment {
    base_risk: RiskLevel,
    categories: BTreeSet<RiskCategory>,
    factors: Vec<&'static str>,
}

impl RiskAssessment {
    fn raise(&mut self, level: RiskLevel) {
        self.base_risk = self.base_risk.max(level);
    }
}

/// Keyword and path based risk scoring with level-dependent approval rules.
#[derive(Debug, Clone)]
pub struct RuleSafetyGate {
    level: RiskLevel,
    auto_approve_safe: bool,
    rules: SafetyRules,
}

impl RuleSafetyGate {
    pub fn new(level: RiskLevel, auto_approve_safe: bool) -> Self {
        tracing::info!(level = %level, auto_approve_safe, "safety gate initialised");
        Self {
            level,
            auto_approve_safe,
            rules: SafetyRules::for_level(level),
        }
    }

    pub fn level(&self) -> RiskLevel {
        self.level
    }

    pub fn evaluate(&self, step: &PlanStep) -> SafetyResult {
        let assessment = assess(step);
        let base = assessment.base_risk;

        let mut approved = true;
        let mut requires_human_approval = false;
        let mut reason = "Action approved".to_string();

        match self.level {
            RiskLevel::High if base >= RiskLevel::High => {
                requires_human_approval = true;
                approved = self.auto_approve_safe;
                reason = format!("High-risk action requires approval: {base}");
            }
            RiskLevel::Critical if base >= RiskLevel::Medium => {
                requires_human_approval = true;
                approved = false;
                reason = format!("Action blocked by critical safety level: {base}");
            }
            _ => {}
        }

        match step.tool_name.as_deref() {
            Some("file_write") if self.rules.require_approval_for_file_write => {
                requires_human_approval = true;
                if !self.auto_approve_safe {
                    approved = false;
                }
                reason = "File write operations require approval".to_string();
            }
            Some("python_exec") if self.rules.require_approval_for_code_execution => {
                requires_human_approval = true;
                approved = false;
                reason = "Code execution requires approval".to_string();
            }
            _ => {}
        }

        SafetyResult {
            approved,
            risk_level: base,
            suggested_modifications: suggestions(&assessment.factors),
            risk_categories: assessment.categories,
            reason,
            requires_human_approval,
        }
    }
}

#[async_trait]
impl SafetyGate for RuleSafetyGate {
    async fn check(&self, step: &PlanStep) -> anyhow::Result<SafetyResult> {
        let result = self.evaluate(step);
        tracing::info!(
            step_id = %step.id,
            approved = result.approved,
            risk = %result.risk_level,
            "safety check"
        );
        Ok(result)
    }
}

fn assess(step: &PlanStep) -> RiskAssessment {
    let mut assessment = RiskAssessment::default();

    if let Some(tool) = step.tool_name.as_deref() {
        assess_tool(&mut assessment, &tool.to_ascii_lowercase(), step);
    }

    let description = step.description.to_ascii_lowercase();
    for &(keyword, factor) in RISKY_KEYWORDS {
        if description.contains(keyword) {
            assessment.factors.push(factor);
        }
    }

    for value in step.parameters.values().filter_map(Value::as_str) {
        if value.starts_with("http://") || value.starts_with("https://") {
            assessment.factors.push("external_url");
        }
        if (value.contains('/') || value.contains('\\')) && is_system_path(value) {
            assessment.factors.push("system_path");
        }
    }

    assessment
}

fn assess_tool(assessment: &mut RiskAssessment, tool: &str, step: &PlanStep) {
    if tool.contains("file") {
        assessment.categories.insert(RiskCategory::FileOperations);

        if tool.contains("write") {
            assessment.raise(RiskLevel::Medium);
            let path = path_parameter(step);
            if is_system_path(path) {
                assessment.factors.push("system_directory");
                assessment.raise(RiskLevel::Critical);
            }
            if is_executable(path) {
                assessment.factors.push("executable_extension");
                assessment.raise(RiskLevel::High);
            }
        }
    }

    if tool.contains("exec") || tool.contains("run") {
        assessment.categories.insert(RiskCategory::CodeExecution);
        assessment.raise(RiskLevel::High);

        let code = step
            .parameters
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if DANGEROUS_CODE.iter().any(|pattern| code.contains(pattern)) {
            assessment.factors.push("system_calls");
            assessment.raise(RiskLevel::Critical);
        }
    }

    if tool.contains("web") || tool.contains("http") {
        assessment.categories.insert(RiskCategory::NetworkAccess);
        assessment.raise(RiskLevel::Medium);
    }
}

fn path_parameter(step: &PlanStep) -> &str {
    ["path", "file_path"]
        .iter()
        .find_map(|key| step.parameters.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
}

fn is_system_path(path: &str) -> bool {
    SYSTEM_PATHS.iter().any(|prefix| path.starts_with(prefix))
}

fn is_executable(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    EXECUTABLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn suggestions(factors: &[&str]) -> Vec<String> {
    [
        ("system_directory", "Consider using a user directory instead of system directory"),
        ("executable_extension", "Consider using a non-executable file extension"),
        ("external_url", "Verify the external URL is trusted"),
        ("system_calls", "Remove system calls from code execution"),
    ]
    .iter()
    .filter(|(factor, _)| factors.contains(factor))
    .map(|(_, suggestion)| (*suggestion).to_string())
    .collect()
}
