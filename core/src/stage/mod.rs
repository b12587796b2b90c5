// agentline/src/stage/mod.rs

//! Stages: the units of work on the line.
//!
//! A `Stage` is a closed variant chosen when a run is assembled. `Active` stages pair a
//! language model with injected `StageLogic`; disabled stages become `Skipped` and only
//! record that they were passed over. Either way `Stage::execute` brackets its own
//! `StageState` and absorbs business failures, so an `Err` from it is always a defect.

pub mod analyzer;
pub mod executor;
pub mod logic;
pub mod planner;
pub mod registry;
pub mod researcher;
pub mod reviewer;
pub mod synthesizer;
pub mod text;
pub mod validator;

pub use analyzer::AnalyzerLogic;
pub use executor::ExecutorLogic;
pub use logic::{StageInput, StageLogic, StageWork};
pub use planner::PlannerLogic;
pub use registry::LogicRegistry;
pub use researcher::ResearcherLogic;
pub use reviewer::ReviewerLogic;
pub use synthesizer::SynthesizerLogic;
pub use validator::ValidatorLogic;

use crate::config::PipelineConfig;
use crate::core::control::{StageKind, StageStatus};
use crate::core::state::{RunState, NEEDS_RETRY_KEY};
use crate::error::{AgentlineError, AgentlineResult};
use crate::model::LanguageModel;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{event, instrument, Level};

/// Run-wide limits a stage needs while it works.
#[derive(Debug, Clone, Copy)]
pub struct RunBounds {
  pub min_score: f64,
  pub max_retries: u32,
  /// Collaborator calls never run past this instant.
  pub deadline: Instant,
}

impl RunBounds {
  pub fn from_config(config: &PipelineConfig) -> Self {
    Self {
      min_score: config.min_score(),
      max_retries: config.max_retries(),
      deadline: Instant::now() + config.run_timeout(),
    }
  }
}

pub enum StageMode {
  Active {
    model: Arc<dyn LanguageModel>,
    logic: Arc<dyn StageLogic>,
    /// Per-stage collaborator deadline, further capped by the run deadline.
    timeout: Option<Duration>,
    /// Raw `agents.<stage>` config section.
    settings: Value,
  },
  Skipped,
}

pub struct Stage {
  kind: StageKind,
  mode: StageMode,
  bounds: RunBounds,
}

impl Stage {
  pub fn active(
    kind: StageKind,
    model: Arc<dyn LanguageModel>,
    logic: Arc<dyn StageLogic>,
    timeout: Option<Duration>,
    settings: Value,
    bounds: RunBounds,
  ) -> Self {
    Self {
      kind,
      mode: StageMode::Active {
        model,
        logic,
        timeout,
        settings,
      },
      bounds,
    }
  }

  pub fn skipped(kind: StageKind, bounds: RunBounds) -> Self {
    Self {
      kind,
      mode: StageMode::Skipped,
      bounds,
    }
  }

  pub fn kind(&self) -> StageKind {
    self.kind
  }

  pub fn is_skipped(&self) -> bool {
    matches!(self.mode, StageMode::Skipped)
  }

  /// Runs one invocation of this stage against `state`.
  ///
  /// Creates a fresh `StageState` instance, moves it to Running, and always leaves it in
  /// a terminal status before returning `Ok`. Collaborator errors, interpretation errors and
  /// timeouts are recorded into `state.errors` and end the instance Failed.
  #[instrument(
    name = "Stage::execute",
    skip_all,
    fields(stage = %self.kind, run_id = %state.run_id()),
    err(Display)
  )]
  pub async fn execute(&self, state: &mut RunState) -> AgentlineResult<()> {
    let instance_id = state.begin_stage(self.kind)?;
    event!(Level::DEBUG, instance = %instance_id, "Stage instance running.");

    let (model, logic, timeout, settings) = match &self.mode {
      StageMode::Skipped => {
        state.push_message(
          "agent",
          format!("{} disabled; skipped", self.kind),
          Some(self.kind),
          Map::new(),
        );
        event!(Level::INFO, "Stage disabled by configuration; skipping.");
        return state.finish_stage(&instance_id, StageStatus::Skipped, None, None);
      }
      StageMode::Active {
        model,
        logic,
        timeout,
        settings,
      } => (model, logic, *timeout, settings),
    };

    if self.kind == StageKind::Validator {
      state.set_result(NEEDS_RETRY_KEY, Value::Bool(false));
    }

    match self.perform(state, model.as_ref(), logic.as_ref(), timeout, settings).await {
      Ok(Outcome::Done(mut output)) => {
        self.apply_effects(state, &mut output);
        let summary = logic.summarize(&output);
        let mut metadata = Map::new();
        metadata.insert("instanceId".to_string(), json!(instance_id));
        state.set_result(self.kind.result_key(), output.clone());
        state.push_message("agent", summary, Some(self.kind), metadata);
        event!(Level::INFO, "Stage completed.");
        state.finish_stage(&instance_id, StageStatus::Completed, Some(output), None)
      }
      Ok(Outcome::Nothing(reason)) => {
        let output = json!({"status": "skipped", "reason": reason});
        state.set_result(self.kind.result_key(), output.clone());
        state.push_message("agent", reason.clone(), Some(self.kind), Map::new());
        event!(Level::INFO, %reason, "Stage had nothing to do.");
        state.finish_stage(&instance_id, StageStatus::Skipped, Some(output), None)
      }
      Err(err) if err.is_business_failure() => {
        let message = err.to_string();
        event!(Level::WARN, error = %message, "Stage failed; the run continues.");
        state.record_error(self.kind.as_str(), message.clone());
        state.finish_stage(&instance_id, StageStatus::Failed, None, Some(message))
      }
      Err(err) => Err(err),
    }
  }

  async fn perform(
    &self,
    state: &RunState,
    model: &dyn LanguageModel,
    logic: &dyn StageLogic,
    timeout: Option<Duration>,
    settings: &Value,
  ) -> AgentlineResult<Outcome> {
    let input = StageInput::new(self.kind, state, settings);
    if input.prior.is_empty() && self.kind != StageKind::Planner {
      event!(Level::DEBUG, "No completed prior stages; running without prior context.");
    }
    let prompt = match logic.prepare(&input) {
      StageWork::Prompt(prompt) => prompt,
      StageWork::Nothing { reason } => return Ok(Outcome::Nothing(reason)),
    };
    let system_prompt = logic.system_prompt(self.kind);

    let remaining = self.bounds.deadline.saturating_duration_since(Instant::now());
    let limit = timeout.map_or(remaining, |t| t.min(remaining));
    let timed_out = || AgentlineError::Timeout {
      stage: self.kind.to_string(),
      seconds: limit.as_secs(),
    };
    if limit.is_zero() {
      return Err(timed_out());
    }

    let response = tokio::time::timeout(limit, model.invoke(&prompt, Some(system_prompt.as_str())))
      .await
      .map_err(|_| timed_out())?
      .map_err(|source| AgentlineError::Collaborator {
        stage: self.kind.to_string(),
        source,
      })?;
    if response.trim().is_empty() {
      return Err(AgentlineError::Interpretation {
        stage: self.kind.to_string(),
        source: anyhow::anyhow!("collaborator returned an empty response"),
      });
    }

    let output = logic
      .interpret(&response, &input)
      .map_err(|source| AgentlineError::Interpretation {
        stage: self.kind.to_string(),
        source,
      })?;
    Ok(Outcome::Done(output))
  }

  /// Kind-specific state effects beyond the stage's own result key.
  fn apply_effects(&self, state: &mut RunState, output: &mut Value) {
    match self.kind {
      StageKind::Planner => {
        if let Some(sequence) = output.get("agentSequence").and_then(Value::as_array) {
          state.next_steps = sequence.iter().filter_map(Value::as_str).map(str::to_string).collect();
        }
      }
      StageKind::Validator => {
        // `passed` is judged against the configured threshold, not the logic default.
        let score = output.get("overallScore").and_then(Value::as_f64).unwrap_or(0.0);
        let passed = score >= self.bounds.min_score;
        if let Some(fields) = output.as_object_mut() {
          fields.insert("passed".to_string(), Value::Bool(passed));
          fields.insert("threshold".to_string(), json!(self.bounds.min_score));
        }
        if !passed && state.try_consume_retry(self.bounds.max_retries) {
          event!(
            Level::INFO,
            score,
            retry_count = state.retry_count(),
            "Validation failed; retry requested."
          );
          state.set_result(NEEDS_RETRY_KEY, Value::Bool(true));
        }
      }
      _ => {}
    }
  }
}

enum Outcome {
  Done(Value),
  Nothing(String),
}

/// The seven stages of one run, built from its merged configuration.
pub struct StageSet {
  stages: HashMap<StageKind, Stage>,
}

impl StageSet {
  pub fn build(
    model: &Arc<dyn LanguageModel>,
    registry: &LogicRegistry,
    config: &PipelineConfig,
    raw_config: &Value,
    bounds: RunBounds,
  ) -> Self {
    let stages = StageKind::ALL
      .iter()
      .map(|&kind| {
        let stage = if config.is_enabled(kind) {
          let settings = raw_config
            .get("agents")
            .and_then(|agents| agents.get(kind.as_str()))
            .cloned()
            .unwrap_or(Value::Null);
          Stage::active(
            kind,
            model.clone(),
            registry.get(kind),
            config.stage_timeout(kind),
            settings,
            bounds,
          )
        } else {
          Stage::skipped(kind, bounds)
        };
        (kind, stage)
      })
      .collect();
    Self { stages }
  }

  pub fn get(&self, kind: StageKind) -> AgentlineResult<&Stage> {
    self
      .stages
      .get(&kind)
      .ok_or_else(|| AgentlineError::Internal(format!("no stage built for '{}'", kind)))
  }
}
