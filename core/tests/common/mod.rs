// tests/common/mod.rs
#![allow(dead_code)] // Not every test file uses every helper

use agentline::{LanguageModel, StageInput, StageKind, StageLogic, StageWork};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::Level;

// --- Canned responses, one per stage kind ---

pub const PLAN: &str = r#"Plan follows.
{"taskAnalysis": "Compare two storage engines", "agentSequence": ["researcher", "analyzer", "synthesizer", "validator"], "keyRequirements": ["benchmarks"], "successCriteria": ["clear recommendation"]}"#;

pub const RESEARCH: &str = "Storage engines differ mainly in write amplification.
- LSM trees favour write-heavy workloads
- B-trees favour read-heavy workloads
- Compaction costs dominate LSM tail latency";

pub const ANALYSIS: &str = "Patterns:
- Write-heavy services see the biggest gains from LSM trees
Implications:
- Tail latency budgets must account for compaction
Recommendations:
- Benchmark both engines with production traces";

/// Synthesis with follow-up work (actionable items and next steps).
pub const SYNTHESIS_WITH_ACTIONS: &str = "LSM trees suit the ingestion service better than B-trees.
- We should run a week-long benchmark on production traces
Next steps:
- Schedule the benchmark window
- Share the results with the storage team";

/// Synthesis with no follow-up work at all.
pub const SYNTHESIS_QUIET: &str = "LSM trees suit the ingestion service better than B-trees.
The evidence is consistent across every source consulted.";

pub const VALIDATION_PASS: &str = "Accuracy: 0.9\nCompleteness: 0.9\nCoherence: 0.9\nRelevance: 0.9\nQuality: 0.9";
pub const VALIDATION_FAIL: &str = "Accuracy: 0.4\nCompleteness: 0.4\nCoherence: 0.4\nRelevance: 0.4\nQuality: 0.4";

pub const EXECUTION: &str = "1. Benchmark scheduled for next week\n2. Results shared with the team";

pub const REVIEW: &str = "Quality score: 0.85
Strengths:
- Clear recommendation backed by evidence
Recommendations:
- Repeat the benchmark after the next release";

/// Reads the stage kind out of the default system prompt ("You are a <kind> agent ...").
pub fn kind_of(system_prompt: Option<&str>) -> Option<StageKind> {
  let prompt = system_prompt?;
  let rest = prompt.strip_prefix("You are a ")?;
  let name = rest.split_whitespace().next()?;
  name.parse().ok()
}

// --- Scripted language model ---

enum Reply {
  Text(String),
  Fail(String),
  Hang,
}

/// A model that answers by stage kind. Queued replies are used first, then the default.
pub struct ScriptedModel {
  defaults: HashMap<StageKind, String>,
  queued: Mutex<HashMap<StageKind, VecDeque<Reply>>>,
  always_fail: HashMap<StageKind, String>,
  calls: Mutex<Vec<StageKind>>,
}

impl ScriptedModel {
  /// Every stage succeeds, validation passes and the synthesis leaves follow-up work.
  pub fn happy() -> Self {
    let defaults = [
      (StageKind::Planner, PLAN),
      (StageKind::Researcher, RESEARCH),
      (StageKind::Analyzer, ANALYSIS),
      (StageKind::Synthesizer, SYNTHESIS_WITH_ACTIONS),
      (StageKind::Validator, VALIDATION_PASS),
      (StageKind::Executor, EXECUTION),
      (StageKind::Reviewer, REVIEW),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .collect();
    Self {
      defaults,
      queued: Mutex::new(HashMap::new()),
      always_fail: HashMap::new(),
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn respond(mut self, kind: StageKind, text: &str) -> Self {
    self.defaults.insert(kind, text.to_string());
    self
  }

  /// The next call for `kind` returns `text` instead of the default.
  pub fn then(self, kind: StageKind, text: &str) -> Self {
    self.queued.lock().entry(kind).or_default().push_back(Reply::Text(text.to_string()));
    self
  }

  /// The next call for `kind` fails with `message`.
  pub fn then_fail(self, kind: StageKind, message: &str) -> Self {
    self.queued.lock().entry(kind).or_default().push_back(Reply::Fail(message.to_string()));
    self
  }

  /// The next call for `kind` never answers.
  pub fn then_hang(self, kind: StageKind) -> Self {
    self.queued.lock().entry(kind).or_default().push_back(Reply::Hang);
    self
  }

  pub fn always_fail(mut self, kind: StageKind, message: &str) -> Self {
    self.always_fail.insert(kind, message.to_string());
    self
  }

  pub fn calls(&self) -> Vec<StageKind> {
    self.calls.lock().clone()
  }

  pub fn call_count(&self, kind: StageKind) -> usize {
    self.calls.lock().iter().filter(|k| **k == kind).count()
  }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
  async fn invoke(&self, _prompt: &str, system_prompt: Option<&str>) -> anyhow::Result<String> {
    let kind = kind_of(system_prompt).ok_or_else(|| anyhow::anyhow!("unrecognised system prompt"))?;
    self.calls.lock().push(kind);
    if let Some(message) = self.always_fail.get(&kind) {
      anyhow::bail!("{}", message);
    }
    let queued = self.queued.lock().get_mut(&kind).and_then(VecDeque::pop_front);
    match queued {
      Some(Reply::Text(text)) => Ok(text),
      Some(Reply::Fail(message)) => Err(anyhow::anyhow!("{}", message)),
      Some(Reply::Hang) => {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
      }
      None => Ok(self.defaults.get(&kind).cloned().unwrap_or_default()),
    }
  }
}

// --- Misbehaving stage logic ---

/// Logic whose `interpret` panics: a defect that escapes the stage.
pub struct PanickingLogic;

impl StageLogic for PanickingLogic {
  fn role_description(&self) -> &str {
    "misbehave"
  }

  fn prepare(&self, _input: &StageInput<'_>) -> StageWork {
    StageWork::Prompt("anything".to_string())
  }

  fn interpret(&self, _response: &str, _input: &StageInput<'_>) -> anyhow::Result<Value> {
    panic!("interpret blew up");
  }

  fn summarize(&self, _output: &Value) -> String {
    String::new()
  }
}

/// Logic that always fails to interpret: a business failure the stage absorbs.
pub struct RejectingLogic;

impl StageLogic for RejectingLogic {
  fn role_description(&self) -> &str {
    "reject everything"
  }

  fn prepare(&self, _input: &StageInput<'_>) -> StageWork {
    StageWork::Prompt("anything".to_string())
  }

  fn interpret(&self, _response: &str, _input: &StageInput<'_>) -> anyhow::Result<Value> {
    anyhow::bail!("unparseable response")
  }

  fn summarize(&self, _output: &Value) -> String {
    String::new()
  }
}

pub fn config_with_retries(max_retries: u32) -> Value {
  json!({"pipeline": {"maxRetries": max_retries}})
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
