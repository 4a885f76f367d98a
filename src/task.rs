use crate::error::TaskError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

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
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// A unit of user-requested work. Tasks are never deleted; finished ones are
/// kept as history by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub priority: TaskPriority,
    pub status: TaskStatus,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            requirements: Vec::new(),
            constraints: Vec::new(),
            context: Map::new(),
            priority: TaskPriority::default(),
            status: TaskStatus::Pending,
            expected_output: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
        }
    }

    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn start(&mut self) -> Result<(), TaskError> {
        if self.status != TaskStatus::Pending {
            return Err(self.invalid("start"));
        }
        let now = Utc::now();
        self.status = TaskStatus::InProgress;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self, result: Value) -> Result<(), TaskError> {
        if self.status != TaskStatus::InProgress {
            return Err(self.invalid("complete"));
        }
        let now = Utc::now();
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TaskError> {
        if !matches!(self.status, TaskStatus::Pending | TaskStatus::InProgress) {
            return Err(self.invalid("fail"));
        }
        self.status = TaskStatus::Failed;
        self.updated_at = Utc::now();
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Terminal from any non-terminal state.
    pub fn cancel(&mut self) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(self.invalid("cancel"));
        }
        self.status = TaskStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> TaskError {
        TaskError::InvalidTransition {
            task_id: self.id.clone(),
            action,
            status: self.status.to_string(),
        }
    }
}
