// agentline/src/core/control.rs

//! Vocabulary shared by every component: the closed set of stage kinds,
//! the status lifecycles of runs and stage instances, and the router's decisions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The seven kinds of stage on the assembly line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
  Planner,
  Researcher,
  Analyzer,
  Synthesizer,
  Validator,
  Executor,
  Reviewer,
}

impl StageKind {
  pub const ALL: [StageKind; 7] = [
    StageKind::Planner,
    StageKind::Researcher,
    StageKind::Analyzer,
    StageKind::Synthesizer,
    StageKind::Validator,
    StageKind::Executor,
    StageKind::Reviewer,
  ];

  /// Node name used in the graph, config keys and `completed_steps`.
  pub fn as_str(&self) -> &'static str {
    match self {
      StageKind::Planner => "planner",
      StageKind::Researcher => "researcher",
      StageKind::Analyzer => "analyzer",
      StageKind::Synthesizer => "synthesizer",
      StageKind::Validator => "validator",
      StageKind::Executor => "executor",
      StageKind::Reviewer => "reviewer",
    }
  }

  /// The single `intermediate_results` key this kind owns.
  pub fn result_key(&self) -> &'static str {
    match self {
      StageKind::Planner => "executionPlan",
      StageKind::Researcher => "researchFindings",
      StageKind::Analyzer => "analysis",
      StageKind::Synthesizer => "synthesis",
      StageKind::Validator => "validation",
      StageKind::Executor => "execution",
      StageKind::Reviewer => "review",
    }
  }
}

impl fmt::Display for StageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for StageKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    StageKind::ALL
      .iter()
      .copied()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| format!("unknown stage '{}'", s))
  }
}

/// Lifecycle of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      RunStatus::Pending => "pending",
      RunStatus::Running => "running",
      RunStatus::Completed => "completed",
      RunStatus::Failed => "failed",
    };
    f.write_str(s)
  }
}

/// Lifecycle of one stage instance: Pending -> Running -> {Completed | Failed | Skipped}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Skipped,
}

impl StageStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped)
  }
}

impl fmt::Display for StageStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      StageStatus::Pending => "pending",
      StageStatus::Running => "running",
      StageStatus::Completed => "completed",
      StageStatus::Failed => "failed",
      StageStatus::Skipped => "skipped",
    };
    f.write_str(s)
  }
}

/// Decision taken by the router at the branch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
  /// Re-enter the research, analysis, synthesis and validation sub-chain.
  Researcher,
  /// Carry out the actionable follow-up work, then review.
  Executor,
  /// Finish the run.
  End,
}

impl Route {
  pub fn as_str(&self) -> &'static str {
    match self {
      Route::Researcher => "researcher",
      Route::Executor => "executor",
      Route::End => "end",
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
