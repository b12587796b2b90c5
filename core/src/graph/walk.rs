// agentline/src/graph/walk.rs

//! One run's traversal of the graph, one node per `advance`.
//!
//! `Orchestrator::run` drives a `Walk` to the end; `Orchestrator::stream` yields the state
//! after each `advance`. Both therefore see exactly the same sequence of visits.

use super::router::Router;
use super::topology::Node;
use crate::core::control::{RunStatus, StageKind, StageStatus};
use crate::core::state::RunState;
use crate::error::AgentlineError;
use crate::monitor::Monitor;
use crate::stage::StageSet;
use futures_util::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{event, span, Instrument, Level};

pub struct Walk {
  state: RunState,
  stages: StageSet,
  router: Router,
  monitor: Monitor,
  next: Option<Node>,
  visits: usize,
  max_visits: usize,
}

impl Walk {
  pub(crate) fn new(mut state: RunState, stages: StageSet, router: Router, monitor: Monitor, max_visits: usize) -> Self {
    state.set_status(RunStatus::Running);
    monitor.record_run_start(state.run_id());
    event!(Level::INFO, run_id = %state.run_id(), task = %state.task(), "Run started.");
    Self {
      state,
      stages,
      router,
      monitor,
      next: Some(Node::ENTRY),
      visits: 0,
      max_visits,
    }
  }

  pub fn state(&self) -> &RunState {
    &self.state
  }

  pub fn into_state(self) -> RunState {
    self.state
  }

  pub fn is_finished(&self) -> bool {
    self.next.is_none()
  }

  /// The node the next `advance` will visit.
  pub fn upcoming(&self) -> Option<Node> {
    self.next
  }

  pub fn visits(&self) -> usize {
    self.visits
  }

  /// Visits the next node. Returns the node visited, or `None` once the walk is over.
  pub async fn advance(&mut self) -> Option<Node> {
    let node = self.next.take()?;
    self.visits += 1;
    if self.visits > self.max_visits {
      self.halt(
        node.name(),
        AgentlineError::StepLimitExceeded {
          limit: self.max_visits,
        },
      );
      return Some(node);
    }

    self.state.current_step = node.name().to_string();
    let visit_span = span!(Level::INFO, "node_visit", node = node.name(), visit = self.visits);
    match node {
      Node::Stage(kind) => {
        if self.visit_stage(kind).instrument(visit_span).await {
          self.next = node.successor();
        }
      }
      Node::Router => {
        let _guard = visit_span.enter();
        let route = self.router.route(&self.state);
        self.state.next_steps = vec![route.as_str().to_string()];
        self.next = Some(route.into());
      }
      Node::End => {
        let _guard = visit_span.enter();
        self.finalize();
      }
    }
    Some(node)
  }

  /// Runs one stage through the node wrapper. Returns false if the walk was halted.
  async fn visit_stage(&mut self, kind: StageKind) -> bool {
    let run_id = self.state.run_id().to_string();
    let stage = match self.stages.get(kind) {
      Ok(stage) => stage,
      Err(err) => {
        self.halt(kind.as_str(), err);
        return false;
      }
    };

    self.monitor.record_stage_start(&run_id, kind.as_str());
    let outcome = AssertUnwindSafe(stage.execute(&mut self.state)).catch_unwind().await;
    let defect = match outcome {
      Ok(Ok(())) => None,
      Ok(Err(err)) => Some(err),
      Err(panic) => Some(AgentlineError::StageDefect {
        stage: kind.to_string(),
        message: panic_message(panic.as_ref()),
      }),
    };

    if let Some(err) = defect {
      self.halt(kind.as_str(), err);
      return false;
    }

    self.state.record_completed_step(kind.as_str());
    match self.state.latest_instance(kind) {
      Some(instance) if instance.status == StageStatus::Failed => {
        let error = instance.error.clone().unwrap_or_default();
        self.monitor.record_stage_failure(&run_id, kind.as_str(), &error);
      }
      _ => self.monitor.record_stage_completion(&run_id, kind.as_str()),
    }
    true
  }

  /// Aborts the walk after a defect: the run is Failed and no further node is visited.
  fn halt(&mut self, node: &str, err: AgentlineError) {
    let message = err.to_string();
    event!(Level::ERROR, node, error = %message, "Defect escaped a node; halting the run.");
    let run_id = self.state.run_id().to_string();
    for stage_name in self.state.fail_open_stages(&message) {
      self.state.record_completed_step(&stage_name);
      self.monitor.record_stage_failure(&run_id, &stage_name, &message);
    }
    self.state.record_error(node, message.clone());
    self.state.set_status(RunStatus::Failed);
    self.state.next_steps.clear();
    self.next = None;
    self.monitor.record_run_completion(&run_id, false, Some(&message));
  }

  /// Closes a run that is being dropped before reaching an end. Open stage instances are
  /// failed and the monitor's run record is marked failed. No-op once the run is over.
  pub(crate) fn abandon(&mut self) {
    if self.state.status() != RunStatus::Running {
      return;
    }
    let message = "run abandoned before reaching the end".to_string();
    event!(Level::WARN, run_id = %self.state.run_id(), visits = self.visits, "Walk dropped mid-run.");
    let run_id = self.state.run_id().to_string();
    for stage_name in self.state.fail_open_stages(&message) {
      self.state.record_completed_step(&stage_name);
      self.monitor.record_stage_failure(&run_id, &stage_name, &message);
    }
    self.state.record_error("walk", message.clone());
    self.state.set_status(RunStatus::Failed);
    self.next = None;
    self.monitor.record_run_completion(&run_id, false, Some(&message));
  }

  fn finalize(&mut self) {
    let final_result = self
      .state
      .result(StageKind::Reviewer.result_key())
      .and_then(|review| review.get("finalResult"))
      .cloned()
      .unwrap_or_else(|| fallback_result(&self.state));
    self.state.set_final_result(final_result);
    self.state.set_status(RunStatus::Completed);
    self.state.next_steps.clear();
    self.monitor.record_run_completion(self.state.run_id(), true, None);
    event!(
      Level::INFO,
      run_id = %self.state.run_id(),
      visits = self.visits,
      errors = self.state.errors().len(),
      "Run completed."
    );
  }
}

/// Final result for runs that end without a successful review.
fn fallback_result(state: &RunState) -> Value {
  let synthesis = state.result(StageKind::Synthesizer.result_key());
  let validation = state.result(StageKind::Validator.result_key());
  let field = |source: Option<&Value>, key: &str| source.and_then(|v| v.get(key)).cloned();
  json!({
    "summary": field(synthesis, "summary").unwrap_or_else(|| json!("Task completed")),
    "keyTakeaways": field(synthesis, "keyTakeaways").unwrap_or_else(|| json!([])),
    "detailedOutput": field(synthesis, "fullSynthesis").unwrap_or_else(|| json!("")),
    "qualityScore": field(validation, "overallScore").unwrap_or(Value::Null),
    "taskCompleted": state.validation_passed().unwrap_or(synthesis.is_some()),
    "strengths": [],
    "recommendations": field(validation, "suggestions").unwrap_or_else(|| json!([])),
    "pipelineSummary": {
      "runId": state.run_id(),
      "agentsExecuted": state.completed_outputs().len(),
      "totalMessages": state.messages().len(),
      "errorsEncountered": state.errors().len(),
      "retryCount": state.retry_count(),
      "startTime": state.start_time(),
      "completedAgents": state.completed_steps(),
    },
  })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    format!("panicked: {}", s)
  } else if let Some(s) = payload.downcast_ref::<String>() {
    format!("panicked: {}", s)
  } else {
    "panicked".to_string()
  }
}
