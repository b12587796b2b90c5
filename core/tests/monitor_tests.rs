// tests/monitor_tests.rs
mod common;
use agentline::monitor::RecordStatus;
use agentline::{JsonFileSink, Monitor, Orchestrator, StageKind};
use common::*;
use futures_util::StreamExt;
use serde_json::{json, Map, Value};
use serial_test::serial;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn test_runs_feed_the_shared_monitor() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy().then_fail(StageKind::Analyzer, "overloaded"));
  let orchestrator = Orchestrator::new(model, json!({})).unwrap();

  let first = orchestrator.run("one", Map::new(), &Value::Null).await.unwrap();
  let second = orchestrator.run("two", Map::new(), &Value::Null).await.unwrap();

  let monitor = orchestrator.monitor();
  let summary = monitor.summary();
  assert_eq!(summary.total_runs, 2);
  assert_eq!(summary.total_successes, 2);
  assert_eq!(summary.success_rate, 1.0);

  let analyzer = monitor.stage_metrics("analyzer").unwrap();
  assert_eq!(analyzer.executions, 2);
  assert_eq!(analyzer.successes, 1);
  assert_eq!(analyzer.failures, 1);
  assert_eq!(summary.stages["analyzer"].success_rate, 0.5);

  let record = monitor.run_metrics(first.run_id()).unwrap();
  assert_eq!(record.status, RecordStatus::Success);
  assert_eq!(record.stages.len(), 7);
  assert!(record.stages.iter().all(|s| s.end_time.is_some()));
  let failed_stage = record.stages.iter().find(|s| s.stage_name == "analyzer").unwrap();
  assert_eq!(failed_stage.status, RecordStatus::Failed);
  assert_eq!(monitor.run_metrics(second.run_id()).unwrap().status, RecordStatus::Success);
}

#[tokio::test]
#[serial]
async fn test_defect_marks_run_failed_in_metrics() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let mut registry = agentline::LogicRegistry::default();
  registry.register(StageKind::Planner, PanickingLogic);
  let orchestrator = Orchestrator::new(model, json!({})).unwrap().with_registry(registry);

  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  let record = orchestrator.monitor().run_metrics(state.run_id()).unwrap();
  assert_eq!(record.status, RecordStatus::Failed);
  assert_eq!(record.errors.len(), 1);
  assert_eq!(orchestrator.monitor().summary().total_failures, 1);
}

#[tokio::test]
#[serial]
async fn test_disabled_monitoring_records_nothing() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model, json!({"monitoring": {"enabled": false}})).unwrap();

  orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();
  assert_eq!(orchestrator.monitor().summary().total_runs, 0);

  // A per-run override switches it back on for that run only.
  orchestrator
    .run("task", Map::new(), &json!({"monitoring": {"enabled": true}}))
    .await
    .unwrap();
  assert_eq!(orchestrator.monitor().summary().total_runs, 1);
}

#[tokio::test]
#[serial]
async fn test_monitor_is_shared_between_orchestrators() {
  setup_tracing();
  let monitor = Monitor::default();
  let a = Orchestrator::new(Arc::new(ScriptedModel::happy()), json!({}))
    .unwrap()
    .with_monitor(monitor.clone());
  let b = Orchestrator::new(Arc::new(ScriptedModel::happy()), json!({}))
    .unwrap()
    .with_monitor(monitor.clone());

  let (ra, rb) = tokio::join!(
    a.run("a", Map::new(), &Value::Null),
    b.run("b", Map::new(), &Value::Null)
  );
  ra.unwrap();
  rb.unwrap();

  assert_eq!(monitor.summary().total_runs, 2);
  assert_eq!(monitor.stage_metrics("planner").unwrap().executions, 2);
}

#[tokio::test]
#[serial]
async fn test_export_writes_json_file() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model, json!({})).unwrap();
  let state = orchestrator.run("task", Map::new(), &Value::Null).await.unwrap();

  let dir = tempfile::tempdir().unwrap();
  let target = dir.path().join("nested");
  let path = orchestrator
    .monitor()
    .export(&JsonFileSink::new(&target))
    .unwrap()
    .unwrap();

  let file_name = std::path::Path::new(&path).file_name().unwrap().to_string_lossy().to_string();
  assert!(file_name.starts_with("metrics_") && file_name.ends_with(".json"));
  let exported: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
  assert_eq!(exported["totalRuns"], json!(1));
  assert_eq!(exported["runs"][state.run_id()]["status"], json!("success"));
  assert_eq!(exported["stages"]["reviewer"]["executions"], json!(1));

  orchestrator.monitor().reset();
  assert_eq!(orchestrator.monitor().summary().total_runs, 0);
}

#[tokio::test]
#[serial]
async fn test_dropped_stream_closes_the_run_record() {
  setup_tracing();
  let model = Arc::new(ScriptedModel::happy());
  let orchestrator = Orchestrator::new(model, json!({})).unwrap();

  let mut updates = Box::pin(orchestrator.stream("task", Map::new(), &Value::Null).unwrap());
  let first = updates.next().await.unwrap();
  updates.next().await.unwrap();
  drop(updates);

  let monitor = orchestrator.monitor();
  let record = monitor.run_metrics(first.run_id()).unwrap();
  assert_eq!(record.status, RecordStatus::Failed);
  assert!(record.end_time.is_some());
  assert!(record.stages.iter().all(|s| s.status != RecordStatus::Running));
  let summary = monitor.summary();
  assert_eq!(summary.total_runs, 1);
  assert_eq!(summary.total_failures, 1);
  assert_eq!(summary.total_successes, 0);
}
