// agentline/src/stage/registry.rs

//! A kind-keyed registry of stage logic. Every kind starts with its default logic;
//! callers replace entries to customise how a stage talks to the model.

use super::analyzer::AnalyzerLogic;
use super::executor::ExecutorLogic;
use super::logic::StageLogic;
use super::planner::PlannerLogic;
use super::researcher::ResearcherLogic;
use super::reviewer::ReviewerLogic;
use super::synthesizer::SynthesizerLogic;
use super::validator::ValidatorLogic;
use crate::core::control::StageKind;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, Level};

#[derive(Clone)]
pub struct LogicRegistry {
  entries: HashMap<StageKind, Arc<dyn StageLogic>>,
}

fn builtin(kind: StageKind) -> Arc<dyn StageLogic> {
  match kind {
    StageKind::Planner => Arc::new(PlannerLogic),
    StageKind::Researcher => Arc::new(ResearcherLogic),
    StageKind::Analyzer => Arc::new(AnalyzerLogic),
    StageKind::Synthesizer => Arc::new(SynthesizerLogic),
    StageKind::Validator => Arc::new(ValidatorLogic),
    StageKind::Executor => Arc::new(ExecutorLogic),
    StageKind::Reviewer => Arc::new(ReviewerLogic),
  }
}

impl LogicRegistry {
  /// Registry holding the built-in logic for all seven kinds.
  pub fn with_defaults() -> Self {
    Self {
      entries: StageKind::ALL.iter().map(|kind| (*kind, builtin(*kind))).collect(),
    }
  }

  /// Replaces the logic used for `kind`.
  pub fn register(&mut self, kind: StageKind, logic: impl StageLogic) -> &mut Self {
    event!(Level::DEBUG, stage = %kind, "Registering custom stage logic.");
    self.entries.insert(kind, Arc::new(logic));
    self
  }

  pub fn get(&self, kind: StageKind) -> Arc<dyn StageLogic> {
    self.entries.get(&kind).cloned().unwrap_or_else(|| builtin(kind))
  }
}

impl Default for LogicRegistry {
  fn default() -> Self {
    Self::with_defaults()
  }
}

impl std::fmt::Debug for LogicRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut kinds: Vec<&StageKind> = self.entries.keys().collect();
    kinds.sort();
    f.debug_struct("LogicRegistry").field("kinds", &kinds).finish()
  }
}
