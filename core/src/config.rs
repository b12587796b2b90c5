// agentline/src/config.rs

//! Typed view over the JSON configuration map consumed by a run.
//!
//! The orchestrator keeps a base config; each run may overlay its own map on top
//! (`merge_values`), and the merged map is parsed into `PipelineConfig` once per run.

use crate::core::control::StageKind;
use crate::error::{AgentlineError, AgentlineResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{event, Level};

pub const DEFAULT_MIN_SCORE: f64 = 0.7;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_EXPORT_PATH: &str = "logs/metrics";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
  pub agents: HashMap<String, StageConfig>,
  pub pipeline: PipelineSettings,
  pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StageConfig {
  pub enabled: bool,
  /// Validator pass threshold; ignored by other stages.
  #[serde(alias = "min_score")]
  pub min_score: Option<f64>,
  #[serde(alias = "timeout_seconds")]
  pub timeout_seconds: Option<u64>,
}

impl Default for StageConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      min_score: None,
      timeout_seconds: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineSettings {
  #[serde(alias = "max_retries")]
  pub max_retries: u32,
  /// Deadline for the whole run; every collaborator call is bounded by what is left of it.
  #[serde(alias = "timeout_seconds")]
  pub timeout_seconds: u64,
  #[serde(alias = "max_node_visits")]
  pub max_node_visits: Option<usize>,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      max_retries: DEFAULT_MAX_RETRIES,
      timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
      max_node_visits: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitoringConfig {
  pub enabled: bool,
  #[serde(alias = "export_path")]
  pub export_path: String,
}

impl Default for MonitoringConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      export_path: DEFAULT_EXPORT_PATH.to_string(),
    }
  }
}

impl PipelineConfig {
  pub fn from_value(value: &Value) -> AgentlineResult<Self> {
    let config: PipelineConfig = if value.is_null() {
      PipelineConfig::default()
    } else {
      serde_json::from_value(value.clone()).map_err(|e| AgentlineError::Configuration {
        key: "<root>".to_string(),
        message: e.to_string(),
      })?
    };
    config.validate()?;
    Ok(config)
  }

  pub fn from_json_str(raw: &str) -> AgentlineResult<Self> {
    let value: Value = serde_json::from_str(raw).map_err(|e| AgentlineError::Configuration {
      key: "<root>".to_string(),
      message: format!("invalid JSON: {}", e),
    })?;
    Self::from_value(&value)
  }

  /// Reads a JSON configuration file.
  pub fn load(path: impl AsRef<Path>) -> AgentlineResult<Self> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| AgentlineError::Configuration {
      key: path.display().to_string(),
      message: e.to_string(),
    })?;
    event!(Level::INFO, path = %path.display(), "Loaded configuration file.");
    Self::from_json_str(&raw)
  }

  fn validate(&self) -> AgentlineResult<()> {
    for name in self.agents.keys() {
      if name.parse::<StageKind>().is_err() {
        event!(Level::WARN, stage = %name, "Configuration names an unknown stage; ignoring it.");
      }
    }
    let min_score = self.min_score();
    if !(0.0..=1.0).contains(&min_score) {
      return Err(AgentlineError::Configuration {
        key: "agents.validator.minScore".to_string(),
        message: format!("must be within [0, 1], got {}", min_score),
      });
    }
    if let Some(0) = self.pipeline.max_node_visits {
      return Err(AgentlineError::Configuration {
        key: "pipeline.maxNodeVisits".to_string(),
        message: "must be greater than zero".to_string(),
      });
    }
    Ok(())
  }

  pub fn stage(&self, kind: StageKind) -> StageConfig {
    self.agents.get(kind.as_str()).cloned().unwrap_or_default()
  }

  pub fn is_enabled(&self, kind: StageKind) -> bool {
    self.stage(kind).enabled
  }

  pub fn min_score(&self) -> f64 {
    self
      .stage(StageKind::Validator)
      .min_score
      .unwrap_or(DEFAULT_MIN_SCORE)
  }

  pub fn max_retries(&self) -> u32 {
    self.pipeline.max_retries
  }

  pub fn run_timeout(&self) -> Duration {
    Duration::from_secs(self.pipeline.timeout_seconds)
  }

  pub fn stage_timeout(&self, kind: StageKind) -> Option<Duration> {
    self.stage(kind).timeout_seconds.map(Duration::from_secs)
  }

  /// Upper bound on node visits for one walk.
  ///
  /// A well-formed walk visits planner and router once, the five-node research loop
  /// (researcher, analyzer, synthesizer, validator, router) at most `max_retries + 1`
  /// times, then executor, reviewer and the terminal node.
  pub fn max_node_visits(&self) -> usize {
    self
      .pipeline
      .max_node_visits
      .unwrap_or_else(|| 5 + 5 * (self.max_retries() as usize + 1))
  }
}

/// Deep-merges `overlay` into `base`; objects merge key by key, anything else in
/// `overlay` replaces what is in `base`.
pub fn merge_values(base: &Value, overlay: &Value) -> Value {
  match (base, overlay) {
    (Value::Object(base_map), Value::Object(overlay_map)) => {
      let mut merged = base_map.clone();
      for (key, overlay_value) in overlay_map {
        let value = match merged.get(key) {
          Some(base_value) => merge_values(base_value, overlay_value),
          None => overlay_value.clone(),
        };
        merged.insert(key.clone(), value);
      }
      Value::Object(merged)
    }
    (base, Value::Null) => base.clone(),
    (_, overlay) => overlay.clone(),
  }
}
