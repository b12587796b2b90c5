// agentline/src/graph/orchestrator.rs

//! The graph executor. Holds everything that outlives a run (model, stage logic, base
//! configuration, monitor) and assembles a fresh `Walk` for every call.

use super::router::Router;
use super::topology::Graph;
use super::walk::Walk;
use crate::config::{merge_values, PipelineConfig};
use crate::core::state::RunState;
use crate::error::AgentlineResult;
use crate::model::LanguageModel;
use crate::monitor::Monitor;
use crate::stage::{LogicRegistry, RunBounds, StageSet};
use futures_util::Stream;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{event, instrument, Level};

pub struct Orchestrator {
  model: Arc<dyn LanguageModel>,
  registry: LogicRegistry,
  base_config: Value,
  monitor: Monitor,
  graph: Graph,
}

impl Orchestrator {
  /// Validates `base_config` up front so configuration mistakes surface at construction.
  pub fn new(model: Arc<dyn LanguageModel>, base_config: Value) -> AgentlineResult<Self> {
    let parsed = PipelineConfig::from_value(&base_config)?;
    Ok(Self {
      model,
      registry: LogicRegistry::default(),
      monitor: Monitor::from_config(&parsed.monitoring),
      base_config,
      graph: Graph::standard(),
    })
  }

  pub fn with_registry(mut self, registry: LogicRegistry) -> Self {
    self.registry = registry;
    self
  }

  /// Shares an existing monitor, e.g. between several orchestrators.
  pub fn with_monitor(mut self, monitor: Monitor) -> Self {
    self.monitor = monitor;
    self
  }

  pub fn monitor(&self) -> &Monitor {
    &self.monitor
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  pub fn graph_visualization(&self) -> String {
    self.graph.to_mermaid()
  }

  /// Builds the run's state and stages without visiting any node.
  ///
  /// `overrides` is deep-merged over the base configuration for this run only.
  pub fn start(&self, task: impl Into<String>, context: Map<String, Value>, overrides: &Value) -> AgentlineResult<Walk> {
    let merged = merge_values(&self.base_config, overrides);
    let config = PipelineConfig::from_value(&merged)?;
    let bounds = RunBounds::from_config(&config);
    let stages = StageSet::build(&self.model, &self.registry, &config, &merged, bounds);
    let monitor = self.monitor.with_enabled(config.monitoring.enabled);
    let state = RunState::new(task, context, merged);
    event!(
      Level::DEBUG,
      run_id = %state.run_id(),
      max_retries = config.max_retries(),
      max_visits = config.max_node_visits(),
      "Run assembled."
    );
    Ok(Walk::new(
      state,
      stages,
      Router::from_config(&config),
      monitor,
      config.max_node_visits(),
    ))
  }

  /// Walks the graph to the end and returns the final state.
  ///
  /// Stage failures and defects are reported inside the returned state; `Err` only means
  /// the run could not be assembled.
  #[instrument(name = "Orchestrator::run", skip_all, fields(run_id = tracing::field::Empty), err(Display))]
  pub async fn run(&self, task: impl Into<String>, context: Map<String, Value>, overrides: &Value) -> AgentlineResult<RunState> {
    let mut walk = self.start(task, context, overrides)?;
    tracing::Span::current().record("run_id", walk.state().run_id());
    while walk.advance().await.is_some() {}
    Ok(walk.into_state())
  }

  /// Same walk as `run`, yielding a snapshot of the state after every visited node.
  ///
  /// The stream is finite and owns its run; calling `stream` again starts a new run.
  /// Dropping it before the end closes the run as failed in the monitor.
  pub fn stream(
    &self,
    task: impl Into<String>,
    context: Map<String, Value>,
    overrides: &Value,
  ) -> AgentlineResult<impl Stream<Item = RunState> + Send + 'static> {
    let mut walk = AbandonOnDrop(self.start(task, context, overrides)?);
    Ok(async_stream::stream! {
      while walk.0.advance().await.is_some() {
        yield walk.0.state().clone();
      }
    })
  }
}

struct AbandonOnDrop(Walk);

impl Drop for AbandonOnDrop {
  fn drop(&mut self) {
    self.0.abandon();
  }
}
