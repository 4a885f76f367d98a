use crate::knowledge::{KnowledgeRecord, KnowledgeStore};
use crate::planner::{ExecutionOutcome, ExecutionPlan, StepStatus};
use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use strum::{AsRefStr, Display};

const EFFECTIVENESS_THRESHOLD: f64 = 0.7;
const TIME_EFFICIENCY_THRESHOLD: f64 = 0.8;
const SUCCESS_RATE_THRESHOLD: f64 = 0.7;
const METRIC_THRESHOLD: f64 = 0.8;
const MAX_TOP_LESSONS: usize = 5;

/// Metrics where a lower value is better; never turned into recommendations.
const LOWER_IS_BETTER: &[&str] = &["error_rate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LearningOutcome {
    Success,
    Failure,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningExperience {
    pub id: String,
    pub task_description: String,
    pub execution_plan_id: String,
    pub outcome: LearningOutcome,
    pub lessons_learned: Vec<String>,
    pub performance_metrics: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningInsights {
    pub total_experiences: usize,
    pub success_rate: f64,
    pub top_lessons: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Turns finished runs into lessons and metrics, and keeps them for later
/// planning advice.
pub struct LearningSystem {
    store: Arc<dyn KnowledgeStore>,
    enabled: bool,
    experiences: Mutex<Vec<LearningExperience>>,
}

impl LearningSystem {
    pub fn new(store: Arc<dyn KnowledgeStore>, enabled: bool) -> Self {
        if enabled {
            tracing::info!("learning system initialized");
        } else {
            tracing::info!("learning system disabled");
        }
        Self {
            store,
            enabled,
            experiences: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn experiences(&self) -> Vec<LearningExperience> {
        self.experiences
            .lock()
            .map(|experiences| experiences.clone())
            .unwrap_or_default()
    }

    /// Record what a run taught. `None` when learning is disabled.
    pub async fn learn_from_execution(
        &self,
        task: &Task,
        plan: &ExecutionPlan,
        outcome: &ExecutionOutcome,
    ) -> Option<LearningExperience> {
        if !self.enabled {
            return None;
        }

        let performance_metrics = calculate_metrics(plan, outcome);
        let lessons_learned = extract_lessons(plan, outcome);
        let now = Utc::now();
        let experience = LearningExperience {
            id: format!("exp_{}_{}", task.id, now.format("%Y%m%d_%H%M%S")),
            task_description: task.description.clone(),
            execution_plan_id: plan.id.clone(),
            outcome: determine_outcome(outcome),
            lessons_learned,
            performance_metrics,
            timestamp: now,
        };

        if let Ok(mut experiences) = self.experiences.lock() {
            experiences.push(experience.clone());
        }
        self.persist(&experience).await;

        tracing::info!(
            plan_id = %plan.id,
            outcome = %experience.outcome,
            lessons = experience.lessons_learned.len(),
            "learned from execution"
        );
        Some(experience)
    }

    async fn persist(&self, experience: &LearningExperience) {
        let outcome = experience.outcome.as_ref();

        for lesson in &experience.lessons_learned {
            let record = KnowledgeRecord::new(lesson.clone(), "lessons_learned", 0.8)
                .with_tags(["learning", "experience", outcome])
                .with_source("learning_system");
            if let Err(err) = self.store.append(record).await {
                tracing::warn!(error = %err, "failed to store lesson");
            }
        }

        if experience.performance_metrics.is_empty() {
            return;
        }
        let metrics = match serde_json::to_string_pretty(&experience.performance_metrics) {
            Ok(metrics) => metrics,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode performance metrics");
                return;
            }
        };
        let record = KnowledgeRecord::new(
            format!("Task performance: {metrics}"),
            "performance_metrics",
            0.9,
        )
        .with_tags(["performance", "metrics", outcome])
        .with_source("learning_system");
        if let Err(err) = self.store.append(record).await {
            tracing::warn!(error = %err, "failed to store performance metrics");
        }
    }

    /// Aggregate over past experiences, optionally only those whose task
    /// description contains `filter` (case-insensitive).
    #[allow(clippy::cast_precision_loss)]
    pub fn insights(&self, filter: Option<&str>) -> LearningInsights {
        let experiences = self.experiences();
        let needle = filter.map(str::to_lowercase);
        let relevant: Vec<&LearningExperience> = experiences
            .iter()
            .filter(|exp| {
                needle
                    .as_deref()
                    .is_none_or(|needle| exp.task_description.to_lowercase().contains(needle))
            })
            .collect();

        if relevant.is_empty() {
            return LearningInsights::default();
        }

        let success_rate = relevant
            .iter()
            .filter(|exp| exp.outcome == LearningOutcome::Success)
            .count() as f64
            / relevant.len() as f64;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();
        for lesson in relevant.iter().flat_map(|exp| &exp.lessons_learned) {
            let count = counts.entry(lesson.as_str()).or_insert(0);
            if *count == 0 {
                first_seen.push(lesson);
            }
            *count += 1;
        }
        // Stable sort keeps first-seen order among equally frequent lessons.
        first_seen.sort_by(|a, b| counts[b].cmp(&counts[a]));
        let top_lessons = first_seen
            .into_iter()
            .take(MAX_TOP_LESSONS)
            .map(str::to_string)
            .collect();

        LearningInsights {
            total_experiences: relevant.len(),
            success_rate,
            top_lessons,
            recommendations: recommendations(&relevant, success_rate),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn calculate_metrics(plan: &ExecutionPlan, outcome: &ExecutionOutcome) -> BTreeMap<String, f64> {
    let progress = &outcome.progress;
    let total = progress.total_steps.max(1) as f64;

    let mut metrics = BTreeMap::new();
    metrics.insert(
        "completion_rate".to_string(),
        progress.progress_percentage / 100.0,
    );
    metrics.insert(
        "success_rate".to_string(),
        if outcome.success() { 1.0 } else { 0.0 },
    );
    metrics.insert(
        "step_efficiency".to_string(),
        progress.completed_steps as f64 / total,
    );
    metrics.insert(
        "error_rate".to_string(),
        progress.failed_steps as f64 / total,
    );
    if let Some(efficiency) = time_efficiency(plan) {
        metrics.insert("time_efficiency".to_string(), efficiency);
    }
    metrics
}

#[allow(clippy::cast_precision_loss)]
fn time_efficiency(plan: &ExecutionPlan) -> Option<f64> {
    match (plan.estimated_total_duration, plan.actual_total_duration) {
        (Some(estimated), Some(actual)) if estimated > 0 && actual > 0 => {
            Some((estimated as f64 / actual as f64).min(1.0))
        }
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn plan_effectiveness(outcome: &ExecutionOutcome) -> f64 {
    let progress = &outcome.progress;
    let mut effectiveness = progress.progress_percentage / 100.0;
    if outcome.success() {
        effectiveness = (effectiveness + 0.2).min(1.0);
    }
    if progress.failed_steps > 0 {
        effectiveness *= 1.0 - (progress.failed_steps as f64 / progress.total_steps as f64) * 0.5;
    }
    effectiveness.max(0.0)
}

/// Error prefixes (text before the first `:`) shared by more than one failed step.
fn recurring_errors(plan: &ExecutionPlan) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for error in plan
        .steps
        .iter()
        .filter(|step| step.status == StepStatus::Failed)
        .filter_map(|step| step.error.as_deref())
    {
        let prefix = error.split_once(':').map_or(error, |(prefix, _)| prefix);
        *counts.entry(prefix).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(prefix, _)| format!("Recurring {prefix} errors"))
        .collect()
}

fn extract_lessons(plan: &ExecutionPlan, outcome: &ExecutionOutcome) -> Vec<String> {
    let mut lessons = Vec::new();

    if plan_effectiveness(outcome) < EFFECTIVENESS_THRESHOLD {
        lessons.push("Consider more detailed planning for similar tasks".to_string());
    }

    let failed = plan
        .steps
        .iter()
        .filter(|step| step.status != StepStatus::Completed)
        .count();
    if failed > 0 {
        lessons.push(format!(
            "Review and improve handling of {failed} failed step types"
        ));
    }

    if time_efficiency(plan).is_some_and(|efficiency| efficiency < TIME_EFFICIENCY_THRESHOLD) {
        lessons.push("Optimize time allocation for similar tasks".to_string());
    }

    let patterns = recurring_errors(plan);
    if !patterns.is_empty() {
        tracing::debug!(plan_id = %plan.id, patterns = ?patterns, "recurring step errors");
        lessons.push("Implement better error handling for common failure modes".to_string());
    }

    lessons
}

fn determine_outcome(outcome: &ExecutionOutcome) -> LearningOutcome {
    if outcome.success() {
        LearningOutcome::Success
    } else if outcome.step_results.iter().any(|result| result.success) {
        LearningOutcome::Partial
    } else {
        LearningOutcome::Failure
    }
}

#[allow(clippy::cast_precision_loss)]
fn recommendations(experiences: &[&LearningExperience], success_rate: f64) -> Vec<String> {
    let mut recommendations = Vec::new();
    if success_rate < SUCCESS_RATE_THRESHOLD {
        recommendations.push("Consider more thorough planning for this type of task".to_string());
    }

    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for (metric, value) in experiences
        .iter()
        .flat_map(|exp| &exp.performance_metrics)
    {
        let entry = totals.entry(metric.as_str()).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    for (metric, (sum, count)) in totals {
        if LOWER_IS_BETTER.contains(&metric) {
            continue;
        }
        if sum / (count as f64) < METRIC_THRESHOLD {
            recommendations.push(format!("Focus on improving {}", metric.replace('_', " ")));
        }
    }
    recommendations
}
