// agentline/examples/basic_run.rs

use agentline::{AgentPipeline, AgentlineError, FnModel};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

// A stand-in for a real completion service: answers by the stage named in the system prompt.
async fn canned_reply(_prompt: String, system: Option<String>) -> anyhow::Result<String> {
  let system = system.unwrap_or_default();
  let stage = system
    .strip_prefix("You are a ")
    .and_then(|rest| rest.split_whitespace().next())
    .unwrap_or_default()
    .to_string();
  Ok(match stage.as_str() {
    "planner" => r#"{"taskAnalysis": "Summarize rollout risks", "agentSequence": ["researcher", "analyzer", "synthesizer", "validator"]}"#.into(),
    "researcher" => "- Canary traffic hides long-tail regressions\n- Feature flags reduce blast radius".into(),
    "analyzer" => "Patterns:\n- Incidents cluster around schema changes".into(),
    "synthesizer" => "Schema changes are the main rollout risk.\n- We should gate migrations behind flags\nNext steps:\n- Add a migration checklist".into(),
    "validator" => "Accuracy: 0.9\nCompleteness: 0.8\nCoherence: 0.9\nRelevance: 0.9\nQuality: 0.85".into(),
    "executor" => "1. Checklist drafted\n2. Flag added".into(),
    _ => "Quality score: 0.8\nStrengths:\n- Concrete and actionable".into(),
  })
}

#[tokio::main]
async fn main() -> Result<(), AgentlineError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Run Example ---");

  let pipeline = AgentPipeline::new(Arc::new(FnModel::new(canned_reply)), json!({}))?;

  let mut context = Map::new();
  context.insert("service".to_string(), json!("billing"));
  let outcome = pipeline
    .run("What are the main risks of our rollout process?", context, &Value::Null)
    .await?;

  info!(success = outcome.success, score = outcome.quality_score, "Run finished.");
  info!("Summary: {}", outcome.summary);
  info!("Steps: {:?}", outcome.metadata.completed_steps);
  info!("Monitor summary: {:?}", pipeline.monitor().summary());
  println!("{}", pipeline.graph_visualization());

  Ok(())
}
