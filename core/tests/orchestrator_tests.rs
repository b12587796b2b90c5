// tests/orchestrator_tests.rs
mod common;
use agentline::{
  LogicRegistry, Orchestrator, Route, Router, RunState, RunStatus, StageKind, StageStatus, NEEDS_RETRY_KEY,
};
use common::*;
use futures_util::StreamExt;
use serde_json::{json, Map, Value};
use serial_test::serial;
use std::sync::Arc;

fn assert_run_invariants(state: &RunState, max_retries: u32) {
  assert_eq!(state.completed_steps().len(), state.terminal_stage_count());
  assert!(state.retry_count() <= max_retries);
  assert_eq!(state.final_result().is_some(), state.status() == RunStatus::Completed);
  assert!(state.stage_states().values().all(|s| s.is_terminal()));
}

fn kinds_in_order(state: &RunState) -> Vec<StageKind> {
  state.stage_history().iter().map(|s| s.kind).collect()
}

#[tokio::test]
#[serial]
async fn test_happy_path_visits_every_stage_once() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model.clone(), json!({})).unwrap();

  let state = orchestrator
    .run("Pick a storage engine", Map::new(), &Value::Null)
    .await
    .unwrap();

  assert_eq!(state.status(), RunStatus::Completed);
  assert_eq!(kinds_in_order(&state), StageKind::ALL.to_vec());
  assert_eq!(
    state.completed_steps(),
    ["planner", "researcher", "analyzer", "synthesizer", "validator", "executor", "reviewer"]
  );
  assert!(state.errors().is_empty());
  assert_eq!(state.messages().len(), 7);
  assert_eq!(state.retry_count(), 0);
  assert_eq!(state.current_step, "end");

  let final_result = state.final_result().unwrap();
  assert_eq!(final_result["qualityScore"], json!(0.85));
  assert_eq!(final_result["taskCompleted"], json!(true));
  assert_eq!(state.result("validation").unwrap()["passed"], json!(true));
  assert_eq!(state.result(NEEDS_RETRY_KEY), Some(&json!(false)));
  assert_run_invariants(&state, 3);
}

#[tokio::test]
#[serial]
async fn test_planner_sets_next_steps_from_plan() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model, json!({})).unwrap();
  let mut walk = orchestrator.start("task", Map::new(), &Value::Null).unwrap();

  walk.advance().await;
  assert_eq!(walk.state().current_step, "planner");
  assert_eq!(
    walk.state().next_steps,
    vec!["researcher", "analyzer", "synthesizer", "validator"]
  );
  assert!(walk.state().result("executionPlan").is_some());
}

#[tokio::test]
#[serial]
async fn test_failed_validation_retries_once_then_passes() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy().then(StageKind::Validator, VALIDATION_FAIL));
  let orchestrator = Orchestrator::new(model.clone(), config_with_retries(3)).unwrap();

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  assert_eq!(state.retry_count(), 1);
  assert_eq!(model.call_count(StageKind::Researcher), 2);
  assert_eq!(model.call_count(StageKind::Validator), 2);
  assert_eq!(model.call_count(StageKind::Executor), 1);
  assert_eq!(state.status(), RunStatus::Completed);

  // Two researcher instances, both kept in the history.
  let researchers: Vec<_> = state
    .stage_history()
    .into_iter()
    .filter(|s| s.kind == StageKind::Researcher)
    .collect();
  assert_eq!(researchers.len(), 2);
  assert_ne!(researchers[0].instance_id, researchers[1].instance_id);
  assert_run_invariants(&state, 3);
}

#[tokio::test]
#[serial]
async fn test_retry_budget_bounds_the_loop() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy().respond(StageKind::Validator, VALIDATION_FAIL));
  let orchestrator = Orchestrator::new(model.clone(), config_with_retries(3)).unwrap();

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  // The third failed attempt consumes the last retry, which the router refuses.
  assert_eq!(state.retry_count(), 3);
  assert_eq!(model.call_count(StageKind::Validator), 3);
  assert_eq!(model.call_count(StageKind::Researcher), 3);
  assert_eq!(state.result(NEEDS_RETRY_KEY), Some(&json!(true)));
  assert_ne!(Router::new(3, true).route(&state), Route::Researcher);
  assert_eq!(state.validation_passed(), Some(false));
  assert_eq!(model.call_count(StageKind::Executor), 0);
  assert_eq!(state.status(), RunStatus::Completed);
  assert_eq!(state.final_result().unwrap()["taskCompleted"], json!(false));
  assert_run_invariants(&state, 3);
}

#[tokio::test]
#[serial]
async fn test_zero_retries_never_loops() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy().respond(StageKind::Validator, VALIDATION_FAIL));
  let orchestrator = Orchestrator::new(model.clone(), config_with_retries(0)).unwrap();

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  assert_eq!(state.retry_count(), 0);
  assert_eq!(model.call_count(StageKind::Researcher), 1);
  assert_run_invariants(&state, 0);
}

#[tokio::test]
#[serial]
async fn test_min_score_override_changes_the_verdict() {
  setup_tracing();
  // 0.4 passes when the threshold is lowered below it.
  let model = Arc::new(ScriptedModel::happy().respond(StageKind::Validator, VALIDATION_FAIL));
  let orchestrator = Orchestrator::new(model.clone(), json!({})).unwrap();

  let state = orchestrator
    .run("task", Map::new(), &json!({"agents": {"validator": {"minScore": 0.3}}}))
    .await
    .unwrap();

  assert_eq!(state.retry_count(), 0);
  assert_eq!(state.validation_passed(), Some(true));
  assert_eq!(model.call_count(StageKind::Executor), 1);
}

#[tokio::test]
#[serial]
async fn test_quiet_synthesis_ends_without_execution() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy().respond(StageKind::Synthesizer, SYNTHESIS_QUIET));
  let orchestrator = Orchestrator::new(model.clone(), json!({})).unwrap();

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  assert_eq!(state.status(), RunStatus::Completed);
  assert!(!state.has_follow_up_work());
  assert!(!state.has_entered(StageKind::Executor));
  assert!(!state.has_entered(StageKind::Reviewer));
  // No review, so the final result is assembled from the synthesis.
  let final_result = state.final_result().unwrap();
  assert_eq!(final_result["qualityScore"], json!(0.9));
  assert!(final_result["detailedOutput"].as_str().unwrap().contains("LSM trees"));
  assert_run_invariants(&state, 3);
}

#[tokio::test]
#[serial]
async fn test_collaborator_failure_is_recorded_and_the_walk_continues() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy().then_fail(StageKind::Researcher, "rate limited"));
  let orchestrator = Orchestrator::new(model.clone(), json!({})).unwrap();
  let mut walk = orchestrator.start("task", Map::new(), &Value::Null).unwrap();

  // planner, router, researcher
  for _ in 0..3 {
    walk.advance().await;
  }
  let state = walk.state();
  assert_eq!(state.status(), RunStatus::Running);
  assert_eq!(state.errors().len(), 1);
  assert_eq!(state.errors()[0].stage_name, "researcher");
  assert!(state.errors()[0].message.contains("rate limited"));
  let researcher = state.latest_instance(StageKind::Researcher).unwrap();
  assert_eq!(researcher.status, StageStatus::Failed);
  assert!(state.result("researchFindings").is_none());
  assert_eq!(walk.upcoming().map(|n| n.name()), Some("analyzer"));

  while walk.advance().await.is_some() {}
  let state = walk.into_state();
  assert_eq!(state.status(), RunStatus::Completed);
  assert_eq!(state.errors().len(), 1);
  assert_run_invariants(&state, 3);
}

#[tokio::test]
#[serial]
async fn test_interpretation_failure_is_a_business_failure() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let mut registry = LogicRegistry::default();
  registry.register(StageKind::Analyzer, RejectingLogic);
  let orchestrator = Orchestrator::new(model, json!({})).unwrap().with_registry(registry);

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  assert_eq!(state.status(), RunStatus::Completed);
  assert_eq!(state.errors().len(), 1);
  assert_eq!(state.errors()[0].stage_name, "analyzer");
  assert!(state.result("analysis").is_none());
  assert_run_invariants(&state, 3);
}

#[tokio::test]
#[serial]
async fn test_empty_response_fails_the_stage() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy().then(StageKind::Analyzer, "   "));
  let orchestrator = Orchestrator::new(model, json!({})).unwrap();

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  assert_eq!(state.latest_instance(StageKind::Analyzer).unwrap().status, StageStatus::Failed);
  assert_eq!(state.errors().len(), 1);
  assert_eq!(state.status(), RunStatus::Completed);
}

#[tokio::test]
#[serial]
async fn test_panicking_stage_halts_the_run() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let mut registry = LogicRegistry::default();
  registry.register(StageKind::Analyzer, PanickingLogic);
  let orchestrator = Orchestrator::new(model.clone(), json!({})).unwrap().with_registry(registry);

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  assert_eq!(state.status(), RunStatus::Failed);
  assert!(state.final_result().is_none());
  assert_eq!(state.errors().len(), 1);
  assert!(state.errors()[0].message.contains("interpret blew up"));
  let analyzer = state.latest_instance(StageKind::Analyzer).unwrap();
  assert_eq!(analyzer.status, StageStatus::Failed);
  assert_eq!(model.call_count(StageKind::Synthesizer), 0);
  assert_eq!(state.completed_steps().last().map(String::as_str), Some("analyzer"));
  assert_run_invariants(&state, 3);
}

#[tokio::test]
#[serial]
async fn test_node_visit_limit_is_a_defect() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model, json!({"pipeline": {"maxNodeVisits": 3}})).unwrap();

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  assert_eq!(state.status(), RunStatus::Failed);
  assert_eq!(kinds_in_order(&state), vec![StageKind::Planner, StageKind::Researcher]);
  assert!(state.errors()[0].message.contains("limit of 3"));
  assert_run_invariants(&state, 3);
}

#[tokio::test]
#[serial]
async fn test_stage_timeout_is_a_business_failure() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy().then_hang(StageKind::Researcher));
  let orchestrator = Orchestrator::new(model, json!({"agents": {"researcher": {"timeoutSeconds": 1}}})).unwrap();

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  assert_eq!(state.status(), RunStatus::Completed);
  assert_eq!(state.errors().len(), 1);
  assert!(state.errors()[0].message.contains("deadline"));
  assert_eq!(state.latest_instance(StageKind::Researcher).unwrap().status, StageStatus::Failed);
}

#[tokio::test]
#[serial]
async fn test_disabled_executor_routes_to_end() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model.clone(), json!({"agents": {"executor": {"enabled": false}}})).unwrap();

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  assert_eq!(state.status(), RunStatus::Completed);
  assert!(state.has_follow_up_work());
  assert_eq!(model.call_count(StageKind::Executor), 0);
  assert_eq!(model.call_count(StageKind::Reviewer), 0);
  assert!(!state.has_entered(StageKind::Executor));
}

#[tokio::test]
#[serial]
async fn test_disabled_stage_is_skipped_in_place() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model.clone(), json!({"agents": {"analyzer": {"enabled": false}}})).unwrap();

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  let analyzer = state.latest_instance(StageKind::Analyzer).unwrap();
  assert_eq!(analyzer.status, StageStatus::Skipped);
  assert!(analyzer.output_data.is_none());
  assert_eq!(model.call_count(StageKind::Analyzer), 0);
  assert!(state.result("analysis").is_none());
  assert!(state.completed_steps().iter().any(|s| s == "analyzer"));
  assert_eq!(state.status(), RunStatus::Completed);
  assert_run_invariants(&state, 3);
}

#[tokio::test]
#[serial]
async fn test_stream_yields_one_snapshot_per_node() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model, json!({})).unwrap();

  let snapshots: Vec<RunState> = orchestrator
    .stream("task", Map::new(), &Value::Null)
    .unwrap()
    .collect()
    .await;

  let steps: Vec<&str> = snapshots.iter().map(|s| s.current_step.as_str()).collect();
  assert_eq!(
    steps,
    [
      "planner",
      "router",
      "researcher",
      "analyzer",
      "synthesizer",
      "validator",
      "router",
      "executor",
      "reviewer",
      "end"
    ]
  );
  assert!(snapshots
    .windows(2)
    .all(|w| w[0].messages().len() <= w[1].messages().len()));
  assert!(snapshots[..snapshots.len() - 1]
    .iter()
    .all(|s| s.status() == RunStatus::Running && s.final_result().is_none()));
  let last = snapshots.last().unwrap();
  assert_eq!(last.status(), RunStatus::Completed);
  // Every stream call is a fresh run.
  let again: Vec<RunState> = orchestrator.stream("task", Map::new(), &Value::Null).unwrap().collect().await;
  assert_ne!(again[0].run_id(), last.run_id());
}

#[tokio::test]
#[serial]
async fn test_invalid_run_config_is_rejected_up_front() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model.clone(), json!({})).unwrap();

  let result = orchestrator
    .run("task", Map::new(), &json!({"agents": {"validator": {"minScore": 2.5}}}))
    .await;

  assert!(matches!(result, Err(agentline::AgentlineError::Configuration { .. })));
  assert!(model.calls().is_empty());
  assert!(Orchestrator::new(model, json!({"pipeline": {"maxRetries": "three"}})).is_err());
}

#[test]
fn test_graph_visualization_is_mermaid() {
  let orchestrator = Orchestrator::new(Arc::new(ScriptedModel::happy()), json!({})).unwrap();
  let diagram = orchestrator.graph_visualization();
  assert!(diagram.starts_with("graph TD"));
  assert!(diagram.contains("validator --> router"));
  assert!(diagram.contains("router -. executor .-> executor"));
}
