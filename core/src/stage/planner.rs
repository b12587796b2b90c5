// agentline/src/stage/planner.rs

use super::logic::{StageInput, StageLogic, StageWork};
use super::text::truncate_chars;
use crate::core::control::StageKind;
use serde_json::{json, Value};
use tracing::{event, Level};

/// Breaks the task into an ordered plan over the other stages.
#[derive(Debug, Default, Clone)]
pub struct PlannerLogic;

const AGENT_CATALOGUE: &str = "- researcher: Gathers information from various sources
- analyzer: Analyzes data and extracts insights
- synthesizer: Combines information from multiple sources
- validator: Validates results and checks quality
- executor: Executes specific actions or commands
- reviewer: Reviews final outputs for quality";

impl PlannerLogic {
  fn fallback_plan(task_analysis: String) -> Value {
    json!({
      "taskAnalysis": task_analysis,
      "complexity": "medium",
      "agentSequence": ["researcher", "analyzer", "synthesizer", "validator"],
      "steps": [],
      "successCriteria": [],
    })
  }

  /// Pulls the outermost `{...}` block out of the response and reads it as the plan.
  fn parse_plan(response: &str) -> Option<Value> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
      return None;
    }
    let raw: Value = serde_json::from_str(&response[start..=end]).ok()?;
    let plan = raw.as_object()?;
    let field = |camel: &str, snake: &str| plan.get(camel).or_else(|| plan.get(snake)).cloned();

    let sequence: Vec<String> = field("agentSequence", "agent_sequence")
      .and_then(|v| v.as_array().cloned())
      .unwrap_or_default()
      .iter()
      .filter_map(|v| v.as_str())
      .filter(|name| name.parse::<StageKind>().is_ok())
      .map(str::to_string)
      .collect();

    Some(json!({
      "taskAnalysis": field("taskAnalysis", "task_analysis").unwrap_or(Value::String(String::new())),
      "complexity": field("complexity", "complexity").unwrap_or_else(|| json!("medium")),
      "agentSequence": sequence,
      "steps": field("steps", "steps").unwrap_or_else(|| json!([])),
      "successCriteria": field("successCriteria", "success_criteria").unwrap_or_else(|| json!([])),
    }))
  }
}

impl StageLogic for PlannerLogic {
  fn role_description(&self) -> &str {
    "analyze tasks and create detailed execution plans, breaking down complex tasks into manageable steps and determining the optimal agent workflow"
  }

  fn prepare(&self, input: &StageInput<'_>) -> StageWork {
    let context = serde_json::to_string(input.state.context()).unwrap_or_default();
    StageWork::Prompt(format!(
      r#"Task: {task}

Context: {context}

Available Agents:
{catalogue}

Create a detailed execution plan that:
1. Breaks down the task into logical steps
2. Assigns each step to the appropriate agent
3. Identifies dependencies between steps
4. Estimates the complexity and time for each step

Return your plan in the following JSON format:
{{
    "taskAnalysis": "Brief analysis of the task",
    "complexity": "low/medium/high",
    "agentSequence": ["agent1", "agent2", ...],
    "steps": [
        {{
            "stepNumber": 1,
            "agent": "agent_name",
            "description": "What this step does",
            "dependencies": ["step numbers this depends on"],
            "expectedOutput": "What we expect from this step"
        }}
    ],
    "successCriteria": ["criteria1", "criteria2", ...]
}}"#,
      task = input.state.task(),
      context = context,
      catalogue = AGENT_CATALOGUE,
    ))
  }

  fn interpret(&self, response: &str, _input: &StageInput<'_>) -> anyhow::Result<Value> {
    match Self::parse_plan(response) {
      Some(plan) => Ok(plan),
      None => {
        event!(Level::WARN, "Plan response carried no usable JSON; using the default plan.");
        Ok(Self::fallback_plan(truncate_chars(response, 200)))
      }
    }
  }

  fn summarize(&self, output: &Value) -> String {
    let steps = output
      .get("agentSequence")
      .and_then(Value::as_array)
      .map_or(0, Vec::len);
    format!("Created execution plan with {} steps", steps)
  }
}
