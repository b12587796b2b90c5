// agentline/src/monitor/metrics.rs

//! Raw metric records and the summary computed from them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
  Running,
  Success,
  Failed,
}

/// One stage invocation as seen by the monitor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
  pub stage_name: String,
  pub start_time: DateTime<Utc>,
  pub end_time: Option<DateTime<Utc>>,
  pub duration_seconds: Option<f64>,
  pub status: RecordStatus,
  pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
  pub start_time: DateTime<Utc>,
  pub end_time: Option<DateTime<Utc>>,
  pub duration_seconds: Option<f64>,
  pub status: RecordStatus,
  /// In invocation order; a stage entered again on retry appears again.
  pub stages: Vec<StageRecord>,
  pub errors: Vec<String>,
}

impl RunRecord {
  pub(crate) fn open_stage_mut(&mut self, stage_name: &str) -> Option<&mut StageRecord> {
    self
      .stages
      .iter_mut()
      .rev()
      .find(|s| s.stage_name == stage_name && s.status == RecordStatus::Running)
  }
}

/// Aggregate counters for one stage name across every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCounters {
  pub executions: u64,
  pub successes: u64,
  pub failures: u64,
  pub total_duration_seconds: f64,
}

impl StageCounters {
  pub fn success_rate(&self) -> f64 {
    ratio(self.successes as f64, self.executions)
  }

  pub fn average_duration_seconds(&self) -> f64 {
    ratio(self.total_duration_seconds, self.executions)
  }
}

/// Everything the monitor has collected.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
  pub runs: BTreeMap<String, RunRecord>,
  pub stages: BTreeMap<String, StageCounters>,
  pub total_runs: u64,
  pub total_successes: u64,
  pub total_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
  pub executions: u64,
  pub success_rate: f64,
  pub average_duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
  pub total_runs: u64,
  pub total_successes: u64,
  pub total_failures: u64,
  pub success_rate: f64,
  pub stages: BTreeMap<String, StageSummary>,
}

impl Metrics {
  pub fn summary(&self) -> MetricsSummary {
    MetricsSummary {
      total_runs: self.total_runs,
      total_successes: self.total_successes,
      total_failures: self.total_failures,
      success_rate: ratio(self.total_successes as f64, self.total_runs),
      stages: self
        .stages
        .iter()
        .filter(|(_, c)| c.executions > 0)
        .map(|(name, c)| {
          (
            name.clone(),
            StageSummary {
              executions: c.executions,
              success_rate: c.success_rate(),
              average_duration_seconds: c.average_duration_seconds(),
            },
          )
        })
        .collect(),
    }
  }
}

fn ratio(numerator: f64, count: u64) -> f64 {
  if count == 0 {
    0.0
  } else {
    numerator / count as f64
  }
}

pub(crate) fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
  (end - start).num_microseconds().map_or(0.0, |us| us as f64 / 1_000_000.0)
}
