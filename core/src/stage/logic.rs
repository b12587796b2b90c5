// agentline/src/stage/logic.rs

//! Defines `StageLogic`, the injected business logic behind each stage: how a stage
//! turns the run state into a prompt and how it turns the model's answer into its output.
//!
//! The orchestration core never looks inside prompts or responses. It only brackets
//! calls to this trait with the stage lifecycle and stores what comes back.

use crate::core::control::StageKind;
use crate::core::state::RunState;
use serde_json::Value;
use std::collections::BTreeMap;

/// What a stage intends to do on this invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StageWork {
  /// Send this prompt to the language model.
  Prompt(String),
  /// Nothing to do; the instance ends Skipped with this reason.
  Nothing { reason: String },
}

/// Read-only view handed to stage logic.
pub struct StageInput<'a> {
  pub kind: StageKind,
  pub state: &'a RunState,
  /// Latest Completed output of every earlier stage kind. Empty when the stage
  /// runs without prior context.
  pub prior: BTreeMap<StageKind, Value>,
  /// The raw `agents.<stage>` section of the run config (`Value::Null` if absent).
  pub settings: &'a Value,
}

impl<'a> StageInput<'a> {
  pub fn new(kind: StageKind, state: &'a RunState, settings: &'a Value) -> Self {
    Self {
      kind,
      state,
      prior: state.completed_outputs(),
      settings,
    }
  }

  pub fn prior(&self, kind: StageKind) -> Option<&Value> {
    self.prior.get(&kind)
  }

  /// A field of an earlier stage's output, e.g. `prior_field(Synthesizer, "summary")`.
  pub fn prior_field(&self, kind: StageKind, field: &str) -> Option<&Value> {
    self.prior(kind).and_then(|output| output.get(field))
  }

  pub fn prior_str(&self, kind: StageKind, field: &str) -> Option<&str> {
    self.prior_field(kind, field).and_then(Value::as_str)
  }

  /// String items of an array field of an earlier stage's output.
  pub fn prior_list(&self, kind: StageKind, field: &str) -> Vec<String> {
    self
      .prior_field(kind, field)
      .and_then(Value::as_array)
      .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
      .unwrap_or_default()
  }
}

pub trait StageLogic: Send + Sync + 'static {
  /// What this stage is for, worded to complete "Your role is to ...".
  fn role_description(&self) -> &str;

  fn system_prompt(&self, kind: StageKind) -> String {
    format!(
      "You are a {} agent in a multi-agent AI system.\nYour role is to {}.\nWork collaboratively with other agents and provide clear, actionable outputs.",
      kind,
      self.role_description()
    )
  }

  fn prepare(&self, input: &StageInput<'_>) -> StageWork;

  /// Structures the model's answer into this stage's output payload.
  fn interpret(&self, response: &str, input: &StageInput<'_>) -> anyhow::Result<Value>;

  /// One-line message appended to the run's log after a successful invocation.
  fn summarize(&self, output: &Value) -> String;
}

/// Renders an optional prior value for inclusion in a prompt.
pub(crate) fn or_unavailable(value: Option<&str>) -> &str {
  value.unwrap_or("Not available")
}
