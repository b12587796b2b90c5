// agentline/examples/streaming.rs

use agentline::{AgentPipeline, AgentlineError, StaticModel};
use futures_util::StreamExt;
use serde_json::{json, Map};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AgentlineError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).init();

  // Every stage gets the same answer; the validator reads 0.5 and asks for one retry.
  let model = StaticModel::new("Accuracy: 0.5\n- a point long enough to keep\nWe should look again");
  let pipeline = AgentPipeline::new(Arc::new(model), json!({"pipeline": {"maxRetries": 1}}))?;

  let updates = pipeline.stream("Stream a short run", Map::new(), &json!({}))?;
  futures_util::pin_mut!(updates);
  while let Some(update) = updates.next().await {
    info!(step = %update.current_step, status = %update.status, "update");
    println!(
      "{:<12} {:<10} completed={} errors={}",
      update.current_step,
      update.status,
      update.completed_steps.len(),
      update.errors.len()
    );
  }
  Ok(())
}
