use crate::planner::types::{DEFAULT_STEP_DURATION_SECS, StepType};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Fully typed result of decoding a model's plan decomposition.
///
/// Nothing downstream of the parser sees raw model output: every field here
/// has already been defaulted and dependency references resolved to step ids.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDraft {
    pub description: Option<String>,
    pub estimated_duration: Option<u64>,
    pub steps: Vec<StepDraft>,
    pub source: DraftSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    Json,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepDraft {
    pub id: String,
    pub description: String,
    pub step_type: StepType,
    pub tool_name: Option<String>,
    pub parameters: Map<String, Value>,
    pub expected_output: Option<String>,
    pub depends_on: Vec<String>,
    pub estimated_duration: u64,
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default, alias = "description")]
    plan_description: Option<String>,
    #[serde(default)]
    estimated_duration: Value,
    steps: Vec<RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    step_type: Option<String>,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    parameters: Value,
    #[serde(default)]
    expected_output: Option<String>,
    #[serde(default)]
    depends_on: Value,
    #[serde(default)]
    estimated_duration: Value,
}

/// Turns reasoner output into a [`PlanDraft`]. Never fails.
#[derive(Debug, Clone)]
pub struct DecompositionParser {
    default_duration: u64,
}

impl Default for DecompositionParser {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_DURATION_SECS)
    }
}

impl DecompositionParser {
    pub fn new(default_duration: u64) -> Self {
        Self { default_duration }
    }

    pub fn parse(&self, text: &str) -> PlanDraft {
        if let Some(raw) = Self::extract_json(text).and_then(|json| {
            serde_json::from_str::<RawPlan>(json)
                .inspect_err(|err| tracing::debug!(error = %err, "plan JSON rejected"))
                .ok()
        }) {
            return self.from_raw(raw);
        }

        tracing::info!("falling back to line-oriented plan parsing");
        self.parse_lines(text)
    }

    /// Text between the first `{` and the last `}`, inclusive.
    pub fn extract_json(text: &str) -> Option<&str> {
        let open = text.find('{')?;
        let close = text.rfind('}')?;
        (close > open).then(|| &text[open..=close])
    }

    fn from_raw(&self, raw: RawPlan) -> PlanDraft {
        let mut used_ids = HashMap::new();
        let ids: Vec<String> = raw
            .steps
            .iter()
            .enumerate()
            .map(|(position, step)| {
                let candidate = value_as_text(&step.id).filter(|id| !id.is_empty());
                match candidate {
                    Some(id) if !used_ids.contains_key(&id) => {
                        used_ids.insert(id.clone(), position);
                        id
                    }
                    other => {
                        if let Some(dup) = other {
                            tracing::warn!(step_id = %dup, "duplicate step id in plan, generating a new one");
                        }
                        uuid::Uuid::new_v4().to_string()
                    }
                }
            })
            .collect();

        let steps = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(position, step)| {
                let depends_on = dependency_refs(&step.depends_on)
                    .into_iter()
                    .map(|reference| resolve_reference(&reference, &used_ids, &ids))
                    .fold(Vec::new(), |mut acc, id| {
                        if !acc.contains(&id) {
                            acc.push(id);
                        }
                        acc
                    });

                let declared_type = step
                    .step_type
                    .as_deref()
                    .and_then(|raw_type| raw_type.trim().parse::<StepType>().ok());
                let tool_name = step
                    .tool_name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty());
                let (step_type, tool_name) = match (declared_type, tool_name) {
                    (None | Some(StepType::ToolCall), Some(name)) => (StepType::ToolCall, Some(name)),
                    (Some(StepType::ToolCall) | None, None) => (StepType::Reasoning, None),
                    (Some(other), _) => (other, None),
                };

                StepDraft {
                    id: ids[position].clone(),
                    description: step
                        .description
                        .filter(|d| !d.trim().is_empty())
                        .unwrap_or_else(|| format!("Step {}", position + 1)),
                    step_type,
                    tool_name,
                    parameters: match step.parameters {
                        Value::Object(map) => map,
                        _ => Map::new(),
                    },
                    expected_output: step.expected_output,
                    depends_on,
                    estimated_duration: value_as_secs(&step.estimated_duration)
                        .unwrap_or(self.default_duration),
                }
            })
            .collect();

        PlanDraft {
            description: raw.plan_description.filter(|d| !d.trim().is_empty()),
            estimated_duration: value_as_secs(&raw.estimated_duration),
            steps,
            source: DraftSource::Json,
        }
    }

    fn parse_lines(&self, text: &str) -> PlanDraft {
        let mut descriptions: Vec<String> = Vec::new();
        let mut current: Option<String> = None;

        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if let Some(body) = strip_step_marker(line) {
                if let Some(done) = current.take() {
                    descriptions.push(done);
                }
                let body = if body.is_empty() { line } else { body };
                current = Some(body.to_string());
            } else if let Some(desc) = current.as_mut() {
                desc.push(' ');
                desc.push_str(line);
            }
        }
        descriptions.extend(current);

        let steps: Vec<StepDraft> = descriptions
            .into_iter()
            .map(|description| StepDraft {
                id: uuid::Uuid::new_v4().to_string(),
                description,
                step_type: StepType::Reasoning,
                tool_name: None,
                parameters: Map::new(),
                expected_output: Some("Step completion".to_string()),
                depends_on: Vec::new(),
                estimated_duration: self.default_duration,
            })
            .collect();

        PlanDraft {
            description: Some("Generated execution plan".to_string()),
            estimated_duration: Some(steps.len() as u64 * self.default_duration),
            steps,
            source: DraftSource::Heuristic,
        }
    }
}

/// Returns the line without its step marker when it starts a new step:
/// `3.`, `3)`, `Step 3`, `- ` or `* `.
fn strip_step_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        return rest
            .strip_prefix('.')
            .or_else(|| rest.strip_prefix(')'))
            .map(str::trim);
    }

    let lower = line.to_ascii_lowercase();
    if let Some(after) = lower.strip_prefix("step ") {
        let digits = after.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 {
            let rest = &line["step ".len() + digits..];
            return Some(rest.trim_start_matches([':', '.', ')', '-', ' ']).trim());
        }
    }

    None
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn value_as_secs(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => {
            let leading: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            leading.parse().ok()
        }
        _ => None,
    }
}

fn dependency_refs(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_as_text).collect(),
        Value::String(_) | Value::Number(_) => value_as_text(value).into_iter().collect(),
        _ => Vec::new(),
    }
    .into_iter()
    .filter(|reference| !reference.is_empty())
    .collect()
}

/// Explicit ids win; otherwise `2`, `"step 2"` and `"step_2"` point at the
/// second step. Anything else is passed through for the validator to judge.
fn resolve_reference(reference: &str, by_id: &HashMap<String, usize>, ids: &[String]) -> String {
    if by_id.contains_key(reference) {
        return reference.to_string();
    }

    let lower = reference.to_ascii_lowercase();
    let number = lower
        .strip_prefix("step")
        .unwrap_or(&lower)
        .trim_start_matches(['_', ' ', '-', '#'])
        .parse::<usize>()
        .ok();

    match number {
        Some(n) if (1..=ids.len()).contains(&n) => ids[n - 1].clone(),
        _ => reference.to_string(),
    }
}
