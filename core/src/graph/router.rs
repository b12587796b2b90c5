// agentline/src/graph/router.rs

//! The branch point after the planner and after every validation.

use crate::config::PipelineConfig;
use crate::core::control::{Route, StageKind};
use crate::core::state::RunState;
use tracing::{event, Level};

/// Pure decision over a `RunState`. Holds only the run's configured limits; never
/// mutates anything. Retry accounting belongs to the validator stage.
#[derive(Debug, Clone, Copy)]
pub struct Router {
  max_retries: u32,
  executor_enabled: bool,
}

impl Router {
  pub fn new(max_retries: u32, executor_enabled: bool) -> Self {
    Self {
      max_retries,
      executor_enabled,
    }
  }

  pub fn from_config(config: &PipelineConfig) -> Self {
    Self::new(config.max_retries(), config.is_enabled(StageKind::Executor))
  }

  /// Until a validator instance exists the router sends the walk into the research
  /// sub-chain. After that the first matching rule wins:
  /// 1. a retry was requested and the budget still allows one: `Researcher`
  /// 2. validation passed (or never ran) and the synthesis left follow-up work: `Executor`
  /// 3. otherwise: `End`
  pub fn route(&self, state: &RunState) -> Route {
    if !state.has_entered(StageKind::Validator) {
      event!(Level::INFO, rule = 0, "Entering the research sub-chain.");
      return Route::Researcher;
    }
    if state.needs_retry() && state.retry_count() < self.max_retries {
      event!(Level::INFO, rule = 1, retry_count = state.retry_count(), "Routing back to researcher.");
      return Route::Researcher;
    }
    // Absence of a validation result counts as passed.
    let passed = state.validation_passed().unwrap_or(true);
    if passed && state.has_follow_up_work() && self.executor_enabled {
      event!(Level::INFO, rule = 2, "Routing to executor.");
      return Route::Executor;
    }
    event!(
      Level::INFO,
      rule = 3,
      passed,
      executor_enabled = self.executor_enabled,
      "Routing to end."
    );
    Route::End
  }
}
