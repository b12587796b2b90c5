// agentline/src/core/stage_state.rs

//! Defines the record kept for a single stage invocation within a run.

use super::control::{StageKind, StageStatus};
use crate::error::{AgentlineError, AgentlineResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One stage invocation. A stage re-entered on retry gets a fresh instance,
/// so the history of every attempt is kept side by side in `RunState::stage_states`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageState {
  pub instance_id: String,
  pub stage_name: String,
  pub kind: StageKind,
  /// Position of this instance among all instances of the run, starting at 0.
  pub sequence: usize,
  pub status: StageStatus,
  pub output_data: Option<Value>,
  pub error: Option<String>,
  pub start_time: Option<DateTime<Utc>>,
  pub end_time: Option<DateTime<Utc>>,
}

impl StageState {
  pub(crate) fn new(kind: StageKind, sequence: usize) -> Self {
    Self {
      instance_id: format!("{}-{}", kind, sequence),
      stage_name: kind.as_str().to_string(),
      kind,
      sequence,
      status: StageStatus::Pending,
      output_data: None,
      error: None,
      start_time: None,
      end_time: None,
    }
  }

  /// Pending -> Running. Any other origin means the instance is being re-entered.
  pub(crate) fn start(&mut self) -> AgentlineResult<()> {
    if self.status != StageStatus::Pending {
      return Err(AgentlineError::StageReentered {
        instance_id: self.instance_id.clone(),
      });
    }
    self.status = StageStatus::Running;
    self.start_time = Some(Utc::now());
    Ok(())
  }

  /// Running -> {Completed | Failed | Skipped}, exactly once.
  pub(crate) fn finish(
    &mut self,
    status: StageStatus,
    output_data: Option<Value>,
    error: Option<String>,
  ) -> AgentlineResult<()> {
    if self.status != StageStatus::Running || !status.is_terminal() {
      return Err(AgentlineError::StageReentered {
        instance_id: self.instance_id.clone(),
      });
    }
    self.status = status;
    self.output_data = output_data;
    self.error = error;
    self.end_time = Some(Utc::now());
    Ok(())
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn instance_passes_through_lifecycle_once() {
    let mut stage = StageState::new(StageKind::Analyzer, 3);
    assert_eq!(stage.instance_id, "analyzer-3");
    assert_eq!(stage.status, StageStatus::Pending);

    stage.start().unwrap();
    assert!(stage.start_time.is_some());
    stage.finish(StageStatus::Completed, Some(Value::Bool(true)), None).unwrap();
    assert!(stage.end_time.is_some());

    assert!(matches!(stage.start(), Err(AgentlineError::StageReentered { .. })));
    assert!(matches!(
      stage.finish(StageStatus::Failed, None, None),
      Err(AgentlineError::StageReentered { .. })
    ));
    assert_eq!(stage.status, StageStatus::Completed);
  }

  #[test]
  fn finish_requires_running_and_terminal_target() {
    let mut stage = StageState::new(StageKind::Planner, 0);
    assert!(stage.finish(StageStatus::Completed, None, None).is_err());
    stage.start().unwrap();
    assert!(stage.finish(StageStatus::Running, None, None).is_err());
    stage.finish(StageStatus::Skipped, None, None).unwrap();
  }
}
