use crate::task::Task;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Planning template families a task can be classified into.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskCategory {
    #[default]
    General,
    Creative,
    Analytical,
    ProblemSolving,
}

impl TaskCategory {
    /// Map a free-form model answer onto a category. Unknown answers fall back
    /// to [`TaskCategory::General`].
    pub fn from_answer(answer: &str) -> Self {
        let normalized: String = answer
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        normalized.parse().unwrap_or_default()
    }
}

pub(crate) const STEP_SCHEMA: &str = r#"Respond in JSON format with this structure:
{
  "plan_description": "Overall plan description",
  "estimated_duration": <total estimated time in seconds>,
  "steps": [
    {
      "id": "short unique step id",
      "description": "Step description",
      "step_type": "reasoning|tool_call|decision|validation|synthesis",
      "tool_name": "tool name if step_type is tool_call",
      "parameters": {},
      "expected_output": "What this step should produce",
      "depends_on": ["ids of steps that must finish first"],
      "estimated_duration": <time in seconds>
    }
  ]
}"#;

pub fn classification_prompt(task: &Task) -> String {
    format!(
        "Classify this task into one of these categories:\n\
         - general: Standard task requiring mixed capabilities\n\
         - creative: Creative or inventive task\n\
         - analytical: Data analysis or research task\n\
         - problem_solving: Problem-solving or troubleshooting task\n\n\
         Task: {}\n\
         Requirements: {}\n\n\
         Respond with just the category name.",
        task.description,
        join_or_none(&task.requirements),
    )
}

pub fn planning_prompt(category: TaskCategory, task: &Task) -> String {
    let requirements = join_or_none(&task.requirements);
    let constraints = join_or_none(&task.constraints);
    let context = if task.context.is_empty() {
        "{}".to_string()
    } else {
        serde_json::to_string_pretty(&task.context).unwrap_or_else(|_| "{}".to_string())
    };

    let body = match category {
        TaskCategory::General => format!(
            "Create a detailed execution plan for this task:\n\n\
             Task: {}\n\
             Requirements: {requirements}\n\
             Constraints: {constraints}\n\
             Context: {context}\n\n\
             Break this down into specific, actionable steps. For each step, specify:\n\
             1. Step description\n\
             2. Step type (reasoning, tool_call, decision, validation, synthesis)\n\
             3. Required tools or capabilities\n\
             4. Expected output\n\
             5. Dependencies on other steps\n\
             6. Estimated duration",
            task.description
        ),
        TaskCategory::Creative => format!(
            "Create an execution plan for this creative task:\n\n\
             Task: {}\n\
             Requirements: {requirements}\n\n\
             Focus on:\n\
             1. Ideation and brainstorming steps\n\
             2. Research and inspiration gathering\n\
             3. Concept development\n\
             4. Iteration and refinement\n\
             5. Final creation and validation\n\n\
             Include creative reasoning steps and synthesis phases.",
            task.description
        ),
        TaskCategory::Analytical => format!(
            "Create an execution plan for this analytical task:\n\n\
             Task: {}\n\
             Requirements: {requirements}\n\
             Data: {context}\n\n\
             Focus on:\n\
             1. Data gathering and validation\n\
             2. Analysis methodology selection\n\
             3. Step-by-step analysis\n\
             4. Results interpretation\n\
             5. Conclusion and recommendations\n\n\
             Include validation steps and quality checks.",
            task.description
        ),
        TaskCategory::ProblemSolving => format!(
            "Create an execution plan for this problem-solving task:\n\n\
             Task: {}\n\
             Problem: {requirements}\n\
             Constraints: {constraints}\n\n\
             Focus on:\n\
             1. Problem understanding and definition\n\
             2. Root cause analysis\n\
             3. Solution generation\n\
             4. Solution evaluation\n\
             5. Implementation planning\n\
             6. Testing and validation\n\n\
             Include decision points and alternative paths.",
            task.description
        ),
    };

    format!("{body}\n\n{STEP_SCHEMA}")
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None specified".to_string()
    } else {
        items.join(", ")
    }
}
