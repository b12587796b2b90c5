// agentline/src/stage/executor.rs

use super::logic::{StageInput, StageLogic, StageWork};
use crate::core::control::StageKind;
use serde_json::{json, Value};

/// Carries out the follow-up actions the synthesis and validation asked for.
#[derive(Debug, Default, Clone)]
pub struct ExecutorLogic;

#[derive(Debug, Clone, PartialEq)]
struct Action {
  kind: &'static str,
  description: String,
}

impl ExecutorLogic {
  fn classify(description: &str) -> &'static str {
    let lower = description.to_lowercase();
    if lower.contains("api") || lower.contains("call") {
      "api_call"
    } else if lower.contains("file") || lower.contains("save") {
      "file_operation"
    } else if lower.contains("query") || lower.contains("search") {
      "query"
    } else {
      "general"
    }
  }

  fn actions(input: &StageInput<'_>) -> Vec<Action> {
    input
      .prior_list(StageKind::Synthesizer, "actionableItems")
      .into_iter()
      .chain(input.prior_list(StageKind::Validator, "suggestions"))
      .map(|description| Action {
        kind: Self::classify(&description),
        description,
      })
      .collect()
  }

  /// The report line for action `n` is the one starting with `n.`; a line mentioning
  /// failure marks the action failed, no line at all marks it unconfirmed.
  fn outcome(response: &str, index: usize) -> (&'static str, String) {
    let marker = format!("{}.", index + 1);
    match response.lines().map(str::trim).find(|line| line.starts_with(&marker)) {
      Some(line) => {
        let lower = line.to_lowercase();
        let status = if lower.contains("fail") || lower.contains("error") {
          "failed"
        } else {
          "completed"
        };
        (status, line[marker.len()..].trim().to_string())
      }
      None => ("unconfirmed", String::new()),
    }
  }
}

impl StageLogic for ExecutorLogic {
  fn role_description(&self) -> &str {
    "execute specific actions and commands based on validated plans, including API calls, file operations, and system interactions"
  }

  fn prepare(&self, input: &StageInput<'_>) -> StageWork {
    let actions = Self::actions(input);
    if actions.is_empty() {
      return StageWork::Nothing {
        reason: "No actions identified".to_string(),
      };
    }
    let listing = actions
      .iter()
      .enumerate()
      .map(|(i, a)| format!("{}. [{}] {}", i + 1, a.kind, a.description))
      .collect::<Vec<_>>()
      .join("\n");
    StageWork::Prompt(format!(
      "Task: {task}

Carry out the following actions in order:
{listing}

Report the outcome of each action on its own line, numbered like the list above.
Mention explicitly when an action failed and why.",
      task = input.state.task(),
      listing = listing,
    ))
  }

  fn interpret(&self, response: &str, input: &StageInput<'_>) -> anyhow::Result<Value> {
    let actions = Self::actions(input);
    let results: Vec<Value> = actions
      .iter()
      .enumerate()
      .map(|(i, action)| {
        let (status, result) = Self::outcome(response, i);
        json!({"action": action.description, "type": action.kind, "status": status, "result": result})
      })
      .collect();
    let completed = results.iter().filter(|r| r["status"] == "completed").count();
    let success_rate = if results.is_empty() {
      0.0
    } else {
      completed as f64 / results.len() as f64
    };
    Ok(json!({
      "actionsExecuted": results.len(),
      "results": results,
      "successRate": success_rate,
    }))
  }

  fn summarize(&self, output: &Value) -> String {
    let executed = output.get("actionsExecuted").and_then(Value::as_u64).unwrap_or(0);
    let rate = output.get("successRate").and_then(Value::as_f64).unwrap_or(0.0);
    format!("Executed {} actions with {:.1}% success rate", executed, rate * 100.0)
  }
}
