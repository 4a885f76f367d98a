use crate::error::PlanError;
use crate::planner::types::ExecutionPlan;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// What to do with a dependency that names a step outside the plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingPolicy {
    /// Drop the edge and keep the plan.
    #[default]
    Repair,
    /// Refuse the plan.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedDependency {
    pub step_id: String,
    pub dependency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub removed_dependencies: Vec<RemovedDependency>,
    pub required_tools: Vec<String>,
    /// Only populated when the validator was given the available tool names.
    pub missing_tools: Vec<String>,
}

/// Structural checks run once between plan construction and execution.
#[derive(Debug, Clone, Default)]
pub struct PlanValidator {
    dangling_policy: DanglingPolicy,
    known_tools: Option<BTreeSet<String>>,
}

impl PlanValidator {
    pub fn new(dangling_policy: DanglingPolicy) -> Self {
        Self {
            dangling_policy,
            known_tools: None,
        }
    }

    pub fn with_known_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn validate(&self, plan: &mut ExecutionPlan) -> Result<ValidationReport, PlanError> {
        Self::check_unique_ids(plan)?;
        let removed_dependencies = self.resolve_dangling(plan)?;

        if let Some(path) = plan.dependency_graph().find_cycle() {
            tracing::error!(plan_id = %plan.id, cycle = %path.join(" -> "), "plan rejected");
            return Err(PlanError::CircularDependency {
                plan_id: plan.id.clone(),
                path,
            });
        }

        let required_tools = plan.required_tools();
        if !required_tools.is_empty() {
            tracing::info!(
                plan_id = %plan.id,
                tools = %required_tools.join(", "),
                "plan requires tools"
            );
        }

        let missing_tools = match &self.known_tools {
            Some(known) => required_tools
                .iter()
                .filter(|tool| !known.contains(*tool))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        for tool in &missing_tools {
            tracing::warn!(plan_id = %plan.id, tool = %tool, "plan references unregistered tool");
        }

        Ok(ValidationReport {
            removed_dependencies,
            required_tools,
            missing_tools,
        })
    }

    /// `add_step` refuses duplicates, but deserialized plans bypass it.
    fn check_unique_ids(plan: &ExecutionPlan) -> Result<(), PlanError> {
        let mut seen = HashSet::with_capacity(plan.steps.len());
        match plan.steps.iter().find(|step| !seen.insert(step.id.as_str())) {
            Some(step) => {
                tracing::error!(plan_id = %plan.id, step_id = %step.id, "plan rejected");
                Err(PlanError::DuplicateStep {
                    plan_id: plan.id.clone(),
                    step_id: step.id.clone(),
                })
            }
            None => Ok(()),
        }
    }

    fn resolve_dangling(
        &self,
        plan: &mut ExecutionPlan,
    ) -> Result<Vec<RemovedDependency>, PlanError> {
        let dangling: Vec<RemovedDependency> = plan
            .dependency_graph()
            .dangling()
            .map(|(step_id, dependency)| RemovedDependency {
                step_id: step_id.to_string(),
                dependency: dependency.to_string(),
            })
            .collect();

        if let (DanglingPolicy::Reject, Some(first)) = (self.dangling_policy, dangling.first()) {
            return Err(PlanError::DanglingDependency {
                plan_id: plan.id.clone(),
                step_id: first.step_id.clone(),
                dependency: first.dependency.clone(),
            });
        }

        for removed in &dangling {
            tracing::warn!(
                plan_id = %plan.id,
                step_id = %removed.step_id,
                dependency = %removed.dependency,
                "dropping dependency on non-existent step"
            );
            if let Some(step) = plan.get_step_mut(&removed.step_id) {
                step.depends_on.retain(|dep| dep != &removed.dependency);
            }
        }

        Ok(dangling)
    }
}
