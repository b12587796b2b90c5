// agentline/examples/custom_logic.rs

use agentline::{
  AgentPipeline, AgentlineError, LogicRegistry, StageInput, StageKind, StageLogic, StageWork, StaticModel,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// A researcher that skips the model entirely when the caller already supplied notes.
struct NotesResearcher;

impl StageLogic for NotesResearcher {
  fn role_description(&self) -> &str {
    "turn caller-supplied notes into research findings"
  }

  fn prepare(&self, input: &StageInput<'_>) -> StageWork {
    match input.state.context().get("notes").and_then(Value::as_str) {
      Some(notes) => StageWork::Prompt(format!("Condense these notes:\n{}", notes)),
      None => StageWork::Nothing {
        reason: "No notes supplied".to_string(),
      },
    }
  }

  fn interpret(&self, response: &str, _input: &StageInput<'_>) -> anyhow::Result<Value> {
    Ok(json!({"summary": response, "keyPoints": [], "confidence": 0.6}))
  }

  fn summarize(&self, _output: &Value) -> String {
    "Research condensed from notes".to_string()
  }
}

#[tokio::main]
async fn main() -> Result<(), AgentlineError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  let mut registry = LogicRegistry::default();
  registry.register(StageKind::Researcher, NotesResearcher);

  let config = json!({
    "agents": {
      "validator": {"minScore": 0.6},
      "reviewer": {"enabled": false}
    },
    "pipeline": {"maxRetries": 2, "timeoutSeconds": 30}
  });
  let pipeline = AgentPipeline::new(Arc::new(StaticModel::new("Quality: 0.9\nAll good.")), config)?
    .with_registry(registry);

  let mut context = Map::new();
  context.insert("notes".to_string(), json!("Latency doubled after the cache change."));
  let outcome = pipeline.run("Explain the latency regression", context, &Value::Null).await?;

  println!("{}", serde_json::to_string_pretty(&outcome).unwrap_or_default());
  if let Some(path) = pipeline.monitor().export_to_default()? {
    println!("metrics written to {}", path);
  }
  Ok(())
}
