// agentline/src/pipeline.rs

//! `AgentPipeline`, the caller-facing entry point. It wraps an `Orchestrator` and turns
//! final states into `RunOutcome`s and streamed states into `StreamUpdate`s.

use crate::core::control::RunStatus;
use crate::core::state::{ErrorRecord, Message, RunState};
use crate::error::{AgentlineError, AgentlineResult};
use crate::graph::Orchestrator;
use crate::model::LanguageModel;
use crate::monitor::Monitor;
use crate::stage::LogicRegistry;
use anyhow::Context;
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{event, Level};

/// What a caller gets back from a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
  /// True only if the walk reached its end. Check `errors` as well: stage failures
  /// along the way do not make this false.
  pub success: bool,
  pub run_id: String,
  pub task: String,
  pub status: RunStatus,
  pub result: Option<Value>,
  pub summary: String,
  pub detailed_output: String,
  pub quality_score: f64,
  pub key_takeaways: Vec<String>,
  pub recommendations: Vec<String>,
  pub stages_executed: usize,
  pub errors: Vec<ErrorRecord>,
  pub metadata: OutcomeMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeMetadata {
  pub start_time: DateTime<Utc>,
  pub completed_steps: Vec<String>,
  pub retry_count: u32,
}

impl RunOutcome {
  pub fn from_state(state: &RunState) -> Self {
    let result = state.final_result().cloned();
    let text = |key: &str| {
      result
        .as_ref()
        .and_then(|r| r.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
    };
    let list = |key: &str| -> Vec<String> {
      result
        .as_ref()
        .and_then(|r| r.get(key))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
    };

    Self {
      success: state.status() == RunStatus::Completed,
      run_id: state.run_id().to_string(),
      task: state.task().to_string(),
      status: state.status(),
      summary: text("summary"),
      detailed_output: text("detailedOutput"),
      quality_score: result
        .as_ref()
        .and_then(|r| r.get("qualityScore"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0),
      key_takeaways: list("keyTakeaways"),
      recommendations: list("recommendations"),
      stages_executed: state.completed_steps().len(),
      errors: state.errors().to_vec(),
      metadata: OutcomeMetadata {
        start_time: state.start_time(),
        completed_steps: state.completed_steps().to_vec(),
        retry_count: state.retry_count(),
      },
      result,
    }
  }
}

/// One streamed observation of a run in progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamUpdate {
  pub run_id: String,
  pub current_step: String,
  pub completed_steps: Vec<String>,
  pub status: RunStatus,
  pub latest_message: Option<Message>,
  pub errors: Vec<ErrorRecord>,
}

impl From<&RunState> for StreamUpdate {
  fn from(state: &RunState) -> Self {
    Self {
      run_id: state.run_id().to_string(),
      current_step: state.current_step.clone(),
      completed_steps: state.completed_steps().to_vec(),
      status: state.status(),
      latest_message: state.latest_message().cloned(),
      errors: state.errors().to_vec(),
    }
  }
}

pub struct AgentPipeline {
  orchestrator: Orchestrator,
  config: Value,
}

impl AgentPipeline {
  pub fn new(model: Arc<dyn LanguageModel>, config: Value) -> AgentlineResult<Self> {
    let orchestrator = Orchestrator::new(model, config.clone())?;
    event!(Level::INFO, "Agent pipeline initialized.");
    Ok(Self { orchestrator, config })
  }

  /// Reads the base configuration from a JSON file.
  pub fn from_config_file(model: Arc<dyn LanguageModel>, path: impl AsRef<Path>) -> AgentlineResult<Self> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| AgentlineError::Configuration {
      key: path.display().to_string(),
      message: e.to_string(),
    })?;
    let config: Value = serde_json::from_str(&raw).map_err(|e| AgentlineError::Configuration {
      key: path.display().to_string(),
      message: format!("invalid JSON: {}", e),
    })?;
    Self::new(model, config)
  }

  pub fn with_registry(mut self, registry: LogicRegistry) -> Self {
    self.orchestrator = self.orchestrator.with_registry(registry);
    self
  }

  pub fn with_monitor(mut self, monitor: Monitor) -> Self {
    self.orchestrator = self.orchestrator.with_monitor(monitor);
    self
  }

  pub fn config(&self) -> &Value {
    &self.config
  }

  pub fn orchestrator(&self) -> &Orchestrator {
    &self.orchestrator
  }

  pub fn monitor(&self) -> &Monitor {
    self.orchestrator.monitor()
  }

  pub fn graph_visualization(&self) -> String {
    self.orchestrator.graph_visualization()
  }

  pub async fn run(&self, task: impl Into<String>, context: Map<String, Value>, overrides: &Value) -> AgentlineResult<RunOutcome> {
    let state = self.orchestrator.run(task, context, overrides).await?;
    Ok(RunOutcome::from_state(&state))
  }

  pub fn stream(
    &self,
    task: impl Into<String>,
    context: Map<String, Value>,
    overrides: &Value,
  ) -> AgentlineResult<impl Stream<Item = StreamUpdate> + Send + 'static> {
    let states = self.orchestrator.stream(task, context, overrides)?;
    Ok(states.map(|state| StreamUpdate::from(&state)))
  }

  /// Writes the base configuration as pretty JSON.
  pub fn save_config(&self, path: impl AsRef<Path>) -> AgentlineResult<()> {
    let path = path.as_ref();
    let body = serde_json::to_string_pretty(&self.config).context("serializing configuration")?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    event!(Level::INFO, path = %path.display(), "Configuration saved.");
    Ok(())
  }
}
