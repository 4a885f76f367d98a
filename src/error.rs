use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `xing`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; collaborator traits (reasoner, tools,
/// safety gate, knowledge store) keep returning `anyhow::Result` so external
/// implementations can attach their own context chains.
#[derive(Debug, Error)]
pub enum XingError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Plan structure ──────────────────────────────────────────────────
    #[error("plan: {0}")]
    Plan(#[from] PlanError),

    // ── Step lifecycle ──────────────────────────────────────────────────
    #[error("step: {0}")]
    Step(#[from] StepError),

    // ── Task lifecycle ──────────────────────────────────────────────────
    #[error("task: {0}")]
    Task(#[from] TaskError),

    // ── Planning ────────────────────────────────────────────────────────
    #[error("planning: {0}")]
    Planning(#[from] PlanningError),

    // ── Tools ───────────────────────────────────────────────────────────
    #[error("tool: {0}")]
    Tool(#[from] ToolError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Plan structure errors ───────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("circular dependency detected in plan {plan_id}: {}", path.join(" -> "))]
    CircularDependency { plan_id: String, path: Vec<String> },

    #[error("step {step_id} in plan {plan_id} depends on unknown step {dependency}")]
    DanglingDependency {
        plan_id: String,
        step_id: String,
        dependency: String,
    },

    #[error("duplicate step id {step_id} in plan {plan_id}")]
    DuplicateStep { plan_id: String, step_id: String },

    #[error("step {step_id} not found in plan {plan_id}")]
    UnknownStep { plan_id: String, step_id: String },
}

// ─── Step lifecycle errors ───────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("step {step_id} cannot {action} while {status}")]
    InvalidTransition {
        step_id: String,
        action: &'static str,
        status: String,
    },
}

// ─── Task lifecycle errors ───────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task {task_id} cannot {action} while {status}")]
    InvalidTransition {
        task_id: String,
        action: &'static str,
        status: String,
    },
}

// ─── Planning errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("reasoner request failed during {stage}: {cause:#}")]
    Reasoner {
        stage: &'static str,
        cause: anyhow::Error,
    },

    #[error("generated plan is invalid: {0}")]
    Invalid(#[from] PlanError),
}

// ─── Tool errors ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool {name} not found")]
    NotFound { name: String },

    #[error("tool {name} rejected parameters: {message}")]
    InvalidParameters { name: String, message: String },

    #[error("tool {name} execution failed: {message}")]
    Execution { name: String, message: String },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, XingError>;
