#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod agent;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod learning;
pub mod planner;
pub mod reasoner;
pub mod safety;
pub mod task;
pub mod tools;

pub use agent::{Agent, AgentBuilder, AgentResponse, AgentState, AgentStatus};
pub use config::XingConfig;
pub use error::{Result, XingError};
pub use planner::{
    ExecutionOutcome, ExecutionPlan, PlanExecutor, PlanOutcome, PlanStep, PlanValidator,
    StepStatus, StepType, TaskPlanner,
};
pub use reasoner::Reasoner;
pub use task::{Task, TaskPriority, TaskStatus};
