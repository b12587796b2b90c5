// agentline/src/monitor/sink.rs

//! Destinations for exported metrics.

use super::metrics::Metrics;
use crate::error::{AgentlineError, AgentlineResult};
use anyhow::Context;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{event, Level};

pub trait MetricsSink: Send + Sync {
  /// Writes the full raw metrics. Returns where they went, if that has a name.
  fn export(&self, metrics: &Metrics) -> AgentlineResult<Option<String>>;
}

/// Writes `metrics_<timestamp>.json` files into a directory, creating it as needed.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
  dir: PathBuf,
  file_name: Option<String>,
}

impl JsonFileSink {
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      dir: dir.as_ref().to_path_buf(),
      file_name: None,
    }
  }

  /// Uses a fixed file name instead of a timestamped one.
  pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
    self.file_name = Some(name.into());
    self
  }

  fn target(&self) -> PathBuf {
    let name = self
      .file_name
      .clone()
      .unwrap_or_else(|| format!("metrics_{}.json", Utc::now().format("%Y%m%d_%H%M%S")));
    self.dir.join(name)
  }
}

impl MetricsSink for JsonFileSink {
  fn export(&self, metrics: &Metrics) -> AgentlineResult<Option<String>> {
    let path = self.target();
    let write = || -> anyhow::Result<()> {
      std::fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))?;
      let body = serde_json::to_string_pretty(metrics).context("serializing metrics")?;
      std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
      Ok(())
    };
    write().map_err(|source| AgentlineError::MetricsExport { source })?;
    event!(Level::INFO, path = %path.display(), "Metrics exported.");
    Ok(Some(path.display().to_string()))
  }
}
