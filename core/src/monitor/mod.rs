// agentline/src/monitor/mod.rs

//! Timing and outcome metrics for runs and stages.
//!
//! One `Monitor` is created per orchestrator and cloned into every run; clones share the
//! same `Metrics`. Recording never waits and never fails the caller: if the lock is held
//! the sample is dropped with a warning and counted in `dropped_samples`.
//!
//! Stage completions and failures only count against a stage start that was recorded, so
//! `successes + failures <= executions` holds even when samples are dropped.

pub mod metrics;
pub mod sink;

pub use metrics::{Metrics, MetricsSummary, RecordStatus, RunRecord, StageCounters, StageRecord, StageSummary};
pub use sink::{JsonFileSink, MetricsSink};

use crate::config::MonitoringConfig;
use crate::core::shared::SharedData;
use crate::error::AgentlineResult;
use chrono::Utc;
use self::metrics::seconds_between;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{event, Level};

#[derive(Debug, Clone)]
pub struct Monitor {
  data: SharedData<Metrics>,
  dropped: Arc<AtomicU64>,
  enabled: bool,
  export_path: String,
}

impl Default for Monitor {
  fn default() -> Self {
    Self::from_config(&MonitoringConfig::default())
  }
}

impl Monitor {
  pub fn from_config(config: &MonitoringConfig) -> Self {
    Self {
      data: SharedData::default(),
      dropped: Arc::new(AtomicU64::new(0)),
      enabled: config.enabled,
      export_path: config.export_path.clone(),
    }
  }

  /// A handle over the same metrics with recording switched on or off.
  pub fn with_enabled(&self, enabled: bool) -> Self {
    Self {
      enabled,
      ..self.clone()
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn export_path(&self) -> &str {
    &self.export_path
  }

  fn record(&self, what: &'static str, f: impl FnOnce(&mut Metrics)) {
    if !self.enabled {
      return;
    }
    match self.data.try_write() {
      Some(mut metrics) => f(&mut metrics),
      None => {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        event!(Level::WARN, record = what, "Monitor busy; dropping metrics sample.");
      }
    }
  }

  /// Samples lost to lock contention since this monitor was created.
  pub fn dropped_samples(&self) -> u64 {
    self.dropped.load(Ordering::Relaxed)
  }

  pub fn record_run_start(&self, run_id: &str) {
    self.record("run_start", |m| {
      m.runs.insert(
        run_id.to_string(),
        RunRecord {
          start_time: Utc::now(),
          end_time: None,
          duration_seconds: None,
          status: RecordStatus::Running,
          stages: Vec::new(),
          errors: Vec::new(),
        },
      );
      m.total_runs += 1;
    });
    event!(Level::DEBUG, %run_id, "Run start recorded.");
  }

  pub fn record_run_completion(&self, run_id: &str, success: bool, error: Option<&str>) {
    self.record("run_completion", |m| {
      let Some(run) = m.runs.get_mut(run_id) else {
        event!(Level::WARN, %run_id, "Completion recorded for an unknown run.");
        return;
      };
      let now = Utc::now();
      run.end_time = Some(now);
      run.duration_seconds = Some(seconds_between(run.start_time, now));
      run.status = if success { RecordStatus::Success } else { RecordStatus::Failed };
      if let Some(error) = error {
        run.errors.push(error.to_string());
      }
      if success {
        m.total_successes += 1;
      } else {
        m.total_failures += 1;
      }
    });
  }

  pub fn record_stage_start(&self, run_id: &str, stage_name: &str) {
    self.record("stage_start", |m| {
      let Some(run) = m.runs.get_mut(run_id) else {
        return;
      };
      run.stages.push(StageRecord {
        stage_name: stage_name.to_string(),
        start_time: Utc::now(),
        end_time: None,
        duration_seconds: None,
        status: RecordStatus::Running,
        error: None,
      });
      m.stages.entry(stage_name.to_string()).or_default().executions += 1;
    });
  }

  pub fn record_stage_completion(&self, run_id: &str, stage_name: &str) {
    self.record("stage_completion", |m| {
      let Some(stage) = m.runs.get_mut(run_id).and_then(|run| run.open_stage_mut(stage_name)) else {
        return;
      };
      let now = Utc::now();
      let duration = seconds_between(stage.start_time, now);
      stage.end_time = Some(now);
      stage.duration_seconds = Some(duration);
      stage.status = RecordStatus::Success;
      let counters = m.stages.entry(stage_name.to_string()).or_default();
      counters.successes += 1;
      counters.total_duration_seconds += duration;
    });
  }

  pub fn record_stage_failure(&self, run_id: &str, stage_name: &str, error: &str) {
    self.record("stage_failure", |m| {
      let Some(stage) = m.runs.get_mut(run_id).and_then(|run| run.open_stage_mut(stage_name)) else {
        return;
      };
      let now = Utc::now();
      stage.duration_seconds = Some(seconds_between(stage.start_time, now));
      stage.end_time = Some(now);
      stage.status = RecordStatus::Failed;
      stage.error = Some(error.to_string());
      m.stages.entry(stage_name.to_string()).or_default().failures += 1;
    });
  }

  pub fn summary(&self) -> MetricsSummary {
    self.data.read().summary()
  }

  /// A copy of the full raw metrics.
  pub fn snapshot(&self) -> Metrics {
    self.data.read().clone()
  }

  pub fn stage_metrics(&self, stage_name: &str) -> Option<StageCounters> {
    self.data.map_read(|m| &m.stages).get(stage_name).copied()
  }

  pub fn run_metrics(&self, run_id: &str) -> Option<RunRecord> {
    self.data.map_read(|m| &m.runs).get(run_id).cloned()
  }

  pub fn reset(&self) {
    *self.data.write() = Metrics::default();
    event!(Level::INFO, "Metrics reset.");
  }

  /// Hands a snapshot to `sink`. Unlike recording, export errors are returned.
  pub fn export(&self, sink: &dyn MetricsSink) -> AgentlineResult<Option<String>> {
    let snapshot = self.snapshot();
    sink.export(&snapshot)
  }

  /// Exports to a timestamped JSON file under the configured export path.
  pub fn export_to_default(&self) -> AgentlineResult<Option<String>> {
    self.export(&JsonFileSink::new(&self.export_path))
  }
}
