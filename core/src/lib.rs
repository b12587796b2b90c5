// src/lib.rs

//! Agentline: an asynchronous assembly line of language-model agents.
//!
//! A run threads one `RunState` through a fixed graph of stages:
//!  - a planner, then a router that decides what happens next,
//!  - a research sub-chain (researcher, analyzer, synthesizer, validator) that the
//!    router may send the run back into while the retry budget lasts,
//!  - an executor and a reviewer when the synthesis left follow-up work.
//!
//! Every stage brackets its own lifecycle and absorbs its own failures, so a flaky model
//! degrades a run instead of aborting it. Only defects (errors escaping a stage, panics,
//! runaway walks) mark a run Failed. A shared `Monitor` collects timing and outcome
//! metrics across runs.

pub mod config;
pub mod core;
pub mod error;
pub mod graph;
pub mod model;
pub mod monitor;
pub mod pipeline;
pub mod stage;

// --- Re-exports for the Public API ---

pub use crate::core::control::{Route, RunStatus, StageKind, StageStatus};
pub use crate::core::shared::SharedData;
pub use crate::core::stage_state::StageState;
pub use crate::core::state::{ErrorRecord, Message, RunState, NEEDS_RETRY_KEY};

pub use crate::config::{merge_values, PipelineConfig};
pub use crate::error::{AgentlineError, AgentlineResult};
pub use crate::graph::{Graph, Node, Orchestrator, Router, Walk};
pub use crate::model::{FnModel, LanguageModel, StaticModel};
pub use crate::monitor::{JsonFileSink, MetricsSink, MetricsSummary, Monitor};
pub use crate::pipeline::{AgentPipeline, RunOutcome, StreamUpdate};
pub use crate::stage::{LogicRegistry, Stage, StageInput, StageLogic, StageWork};

/*
    Typical use:
    1. Implement `LanguageModel` for your completion service (or use `FnModel`).
    2. Build an `AgentPipeline` with a JSON config map (see `PipelineConfig`).
    3. Optionally swap stage behaviour through a `LogicRegistry`.
    4. `run` for a `RunOutcome`, or `stream` for a `StreamUpdate` per visited node.
    5. Inspect `monitor().summary()` or export the raw metrics to a `MetricsSink`.
*/
