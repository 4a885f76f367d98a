mod executor;
mod graph;
mod parser;
mod task_planner;
pub mod templates;
mod types;
mod validator;

pub use executor::{
    BlockedStep, ExecutionOutcome, PlanExecutor, PlanOutcome, SkippedStep, StepResult,
};
pub use graph::DependencyGraph;
pub use parser::{DecompositionParser, DraftSource, PlanDraft, StepDraft};
pub use task_planner::TaskPlanner;
pub use templates::TaskCategory;
pub use types::{
    DEFAULT_MAX_RETRIES, DEFAULT_STEP_DURATION_SECS, ExecutionPlan, PlanProgress, PlanStep,
    StepStatus, StepType,
};
pub use validator::{DanglingPolicy, PlanValidator, RemovedDependency, ValidationReport};
