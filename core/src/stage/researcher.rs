// agentline/src/stage/researcher.rs

use super::logic::{or_unavailable, StageInput, StageLogic, StageWork};
use super::text::truncate_chars;
use crate::core::control::StageKind;
use serde_json::{json, Value};

/// Gathers the information the rest of the line works from.
#[derive(Debug, Default, Clone)]
pub struct ResearcherLogic;

impl ResearcherLogic {
  fn key_points(response: &str) -> Vec<String> {
    response
      .lines()
      .filter(|line| line.trim().starts_with('-'))
      .map(|line| line.trim().trim_matches(|c: char| c == '-' || c == ' ').to_string())
      .take(10)
      .collect()
  }

  /// Longer, structured answers read as more trustworthy.
  fn confidence(response: &str) -> f64 {
    let structured = ["1.", "2.", "-", "*"].iter().any(|m| response.contains(m));
    let length_score = (response.chars().count() as f64 / 1000.0).min(1.0);
    let structure_score = if structured { 0.3 } else { 0.0 };
    (length_score + structure_score).min(1.0)
  }
}

impl StageLogic for ResearcherLogic {
  fn role_description(&self) -> &str {
    "gather and collect relevant information from various sources, including documents, databases, and external APIs"
  }

  fn prepare(&self, input: &StageInput<'_>) -> StageWork {
    let context = serde_json::to_string(input.state.context()).unwrap_or_default();
    StageWork::Prompt(format!(
      "Task: {task}

Context: {context}

Execution Plan: {plan}

Your goal is to research and gather relevant information for this task.
Focus on:
1. Key concepts and definitions
2. Relevant data and statistics
3. Best practices and methodologies
4. Potential challenges and solutions

Provide a comprehensive research summary with:
- Key findings
- Data points
- Sources (if applicable)
- Relevance to the task

Structure your response clearly with sections and bullet points.",
      task = input.state.task(),
      context = context,
      plan = or_unavailable(input.prior_str(StageKind::Planner, "taskAnalysis")),
    ))
  }

  fn interpret(&self, response: &str, _input: &StageInput<'_>) -> anyhow::Result<Value> {
    Ok(json!({
      "summary": truncate_chars(response, 500),
      "keyPoints": Self::key_points(response),
      "fullResearch": response,
      "confidence": Self::confidence(response),
    }))
  }

  fn summarize(&self, output: &Value) -> String {
    let points = output.get("keyPoints").and_then(Value::as_array).map_or(0, Vec::len);
    format!("Research completed: Found {} key points", points)
  }
}
