// agentline/src/core/state.rs

//! The run state threaded through every stage, plus the message and error logs it carries.

use super::control::{RunStatus, StageKind, StageStatus};
use super::stage_state::StageState;
use crate::error::{AgentlineError, AgentlineResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Key the validator writes to request another pass through the research sub-chain.
pub const NEEDS_RETRY_KEY: &str = "needsRetry";

/// An entry of the run's communication log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  pub role: String,
  pub content: String,
  pub timestamp: DateTime<Utc>,
  pub origin_stage: Option<String>,
  pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
  pub stage_name: String,
  pub message: String,
  pub timestamp: DateTime<Utc>,
}

/// The single mutable aggregate of a run.
///
/// Exactly one stage holds it at a time (`&mut RunState` for the duration of
/// `Stage::execute`), then hands it back to the walk. The log-like fields
/// (`messages`, `completed_steps`, `errors`) only ever grow; fields fixed at
/// creation are readable through accessors only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
  task: String,
  context: Map<String, Value>,
  messages: Vec<Message>,
  stage_states: HashMap<String, StageState>,
  pub current_step: String,
  pub next_steps: Vec<String>,
  completed_steps: Vec<String>,
  intermediate_results: BTreeMap<String, Value>,
  final_result: Option<Value>,
  run_id: String,
  start_time: DateTime<Utc>,
  status: RunStatus,
  errors: Vec<ErrorRecord>,
  retry_count: u32,
  config: Value,
}

impl RunState {
  pub fn new(task: impl Into<String>, context: Map<String, Value>, config: Value) -> Self {
    Self {
      task: task.into(),
      context,
      messages: Vec::new(),
      stage_states: HashMap::new(),
      current_step: "start".to_string(),
      next_steps: vec![StageKind::Planner.as_str().to_string()],
      completed_steps: Vec::new(),
      intermediate_results: BTreeMap::new(),
      final_result: None,
      run_id: Uuid::new_v4().to_string(),
      start_time: Utc::now(),
      status: RunStatus::Pending,
      errors: Vec::new(),
      retry_count: 0,
      config,
    }
  }

  // --- Read access ---

  pub fn task(&self) -> &str {
    &self.task
  }

  pub fn context(&self) -> &Map<String, Value> {
    &self.context
  }

  pub fn messages(&self) -> &[Message] {
    &self.messages
  }

  pub fn latest_message(&self) -> Option<&Message> {
    self.messages.last()
  }

  pub fn stage_states(&self) -> &HashMap<String, StageState> {
    &self.stage_states
  }

  pub fn stage_state(&self, instance_id: &str) -> Option<&StageState> {
    self.stage_states.get(instance_id)
  }

  /// Stage instances in the order they were started.
  pub fn stage_history(&self) -> Vec<&StageState> {
    let mut history: Vec<&StageState> = self.stage_states.values().collect();
    history.sort_by_key(|s| s.sequence);
    history
  }

  pub fn completed_steps(&self) -> &[String] {
    &self.completed_steps
  }

  pub fn intermediate_results(&self) -> &BTreeMap<String, Value> {
    &self.intermediate_results
  }

  pub fn result(&self, key: &str) -> Option<&Value> {
    self.intermediate_results.get(key)
  }

  pub fn final_result(&self) -> Option<&Value> {
    self.final_result.as_ref()
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  pub fn start_time(&self) -> DateTime<Utc> {
    self.start_time
  }

  pub fn status(&self) -> RunStatus {
    self.status
  }

  pub fn errors(&self) -> &[ErrorRecord] {
    &self.errors
  }

  pub fn retry_count(&self) -> u32 {
    self.retry_count
  }

  pub fn config(&self) -> &Value {
    &self.config
  }

  /// Latest output per stage kind, taken only from instances that reached Completed.
  pub fn completed_outputs(&self) -> BTreeMap<StageKind, Value> {
    let mut outputs = BTreeMap::new();
    for stage in self.stage_history() {
      if stage.status != StageStatus::Completed {
        continue;
      }
      if let Some(output) = &stage.output_data {
        outputs.insert(stage.kind, output.clone());
      }
    }
    outputs
  }

  /// Most recently started instance of `kind`.
  pub fn latest_instance(&self, kind: StageKind) -> Option<&StageState> {
    self
      .stage_states
      .values()
      .filter(|s| s.kind == kind)
      .max_by_key(|s| s.sequence)
  }

  /// Whether any instance of `kind` has been started in this run.
  pub fn has_entered(&self, kind: StageKind) -> bool {
    self.stage_states.values().any(|s| s.kind == kind)
  }

  pub fn terminal_stage_count(&self) -> usize {
    self.stage_states.values().filter(|s| s.is_terminal()).count()
  }

  /// `validation.passed` as last written by the validator, if any.
  pub fn validation_passed(&self) -> Option<bool> {
    self
      .intermediate_results
      .get(StageKind::Validator.result_key())
      .and_then(|v| v.get("passed"))
      .and_then(Value::as_bool)
  }

  pub fn needs_retry(&self) -> bool {
    self
      .intermediate_results
      .get(NEEDS_RETRY_KEY)
      .and_then(Value::as_bool)
      .unwrap_or(false)
  }

  /// Whether the synthesizer left actionable items or next steps behind.
  pub fn has_follow_up_work(&self) -> bool {
    let Some(synthesis) = self.intermediate_results.get(StageKind::Synthesizer.result_key()) else {
      return false;
    };
    ["actionableItems", "nextSteps"].iter().any(|field| {
      synthesis
        .get(*field)
        .and_then(Value::as_array)
        .map_or(false, |items| !items.is_empty())
    })
  }

  // --- Mutation, crate-internal so the stage and walk contracts stay the only writers ---

  pub(crate) fn set_status(&mut self, status: RunStatus) {
    self.status = status;
  }

  pub(crate) fn push_message(
    &mut self,
    role: &str,
    content: impl Into<String>,
    origin: Option<StageKind>,
    metadata: Map<String, Value>,
  ) {
    self.messages.push(Message {
      role: role.to_string(),
      content: content.into(),
      timestamp: Utc::now(),
      origin_stage: origin.map(|k| k.as_str().to_string()),
      metadata,
    });
  }

  pub(crate) fn record_error(&mut self, stage_name: &str, message: impl Into<String>) {
    self.errors.push(ErrorRecord {
      stage_name: stage_name.to_string(),
      message: message.into(),
      timestamp: Utc::now(),
    });
  }

  pub(crate) fn set_result(&mut self, key: &str, value: Value) {
    self.intermediate_results.insert(key.to_string(), value);
  }

  pub(crate) fn set_final_result(&mut self, value: Value) {
    self.final_result = Some(value);
  }

  /// Grants one retry if the budget allows it. Returns whether it was granted.
  pub(crate) fn try_consume_retry(&mut self, max_retries: u32) -> bool {
    if self.retry_count < max_retries {
      self.retry_count += 1;
      true
    } else {
      false
    }
  }

  pub(crate) fn record_completed_step(&mut self, name: &str) {
    self.completed_steps.push(name.to_string());
  }

  /// Creates a new instance for `kind` and moves it to Running. Returns its id.
  pub(crate) fn begin_stage(&mut self, kind: StageKind) -> AgentlineResult<String> {
    let mut stage = StageState::new(kind, self.stage_states.len());
    stage.start()?;
    let instance_id = stage.instance_id.clone();
    self.stage_states.insert(instance_id.clone(), stage);
    Ok(instance_id)
  }

  pub(crate) fn finish_stage(
    &mut self,
    instance_id: &str,
    status: StageStatus,
    output_data: Option<Value>,
    error: Option<String>,
  ) -> AgentlineResult<()> {
    self
      .stage_states
      .get_mut(instance_id)
      .ok_or_else(|| AgentlineError::Internal(format!("unknown stage instance '{}'", instance_id)))?
      .finish(status, output_data, error)
  }

  /// Closes every instance still Running as Failed. Used when a defect escapes a stage.
  /// Returns the stage names that were closed.
  pub(crate) fn fail_open_stages(&mut self, reason: &str) -> Vec<String> {
    let mut closed = Vec::new();
    for stage in self.stage_states.values_mut() {
      if stage.status == StageStatus::Running
        && stage.finish(StageStatus::Failed, None, Some(reason.to_string())).is_ok()
      {
        closed.push(stage.stage_name.clone());
      }
    }
    closed
  }
}
