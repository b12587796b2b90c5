// agentline/src/stage/reviewer.rs

use super::logic::{StageInput, StageLogic, StageWork};
use super::text::{keyword_lines, labelled_score, section_items};
use crate::core::control::StageKind;
use chrono::Utc;
use serde_json::{json, Value};

/// Final review of everything the line produced; also drafts the run's final result.
#[derive(Debug, Default, Clone)]
pub struct ReviewerLogic;

const COMPLETION_THRESHOLD: f64 = 0.7;

impl ReviewerLogic {
  /// An explicit score if one is stated, otherwise a rough read of the tone.
  fn quality_score(text: &str) -> f64 {
    for label in ["quality score", "overall", "score"] {
      if let Some(score) = labelled_score(text, label) {
        return score;
      }
    }
    let lower = text.to_lowercase();
    let positive = ["excellent", "good", "strong", "effective", "successful"]
      .iter()
      .filter(|w| lower.contains(*w))
      .count();
    let negative = ["poor", "weak", "insufficient", "incomplete", "failed"]
      .iter()
      .filter(|w| lower.contains(*w))
      .count();
    match positive.cmp(&negative) {
      std::cmp::Ordering::Greater => 0.8,
      std::cmp::Ordering::Less => 0.5,
      std::cmp::Ordering::Equal => 0.7,
    }
  }

  fn pipeline_summary(input: &StageInput<'_>) -> Value {
    let state = input.state;
    let completed: Vec<&str> = input.prior.keys().map(|k| k.as_str()).collect();
    json!({
      "runId": state.run_id(),
      "agentsExecuted": completed.len(),
      "totalMessages": state.messages().len(),
      "errorsEncountered": state.errors().len(),
      "retryCount": state.retry_count(),
      "startTime": state.start_time(),
      "endTime": Utc::now(),
      "completedAgents": completed,
    })
  }
}

impl StageLogic for ReviewerLogic {
  fn role_description(&self) -> &str {
    "perform comprehensive final review of all outputs, ensuring quality, completeness, and alignment with the original task requirements"
  }

  fn prepare(&self, input: &StageInput<'_>) -> StageWork {
    let agents: Vec<&str> = input.prior.keys().map(|k| k.as_str()).collect();
    let count = |kind: StageKind, field: &str| input.prior_field(kind, field).and_then(Value::as_array).map_or(0, Vec::len);
    let number = |kind: StageKind, field: &str| {
      input
        .prior_field(kind, field)
        .and_then(Value::as_f64)
        .map_or_else(|| "N/A".to_string(), |v| format!("{:.2}", v))
    };

    StageWork::Prompt(format!(
      "Original Task: {task}

Pipeline Execution Summary:
- Agents involved: {agents}
- Validation score: {validation_score}
- Execution success rate: {success_rate}

SYNTHESIS:
{synthesis}

VALIDATION RESULTS:
Issues: {issues}
Suggestions: {suggestions}

Perform a comprehensive final review:

1. **Task Alignment**: Does the output fully address the original task?
2. **Quality Assessment**: Is the output of high quality?
3. **Completeness**: Is anything missing or incomplete?
4. **Value Delivered**: Does this provide real value?
5. **Recommendations**: Any final recommendations?

Provide:
- Overall quality score (0-1)
- Strengths of the output
- Areas for improvement
- Final recommendations
- Whether the task was successfully completed

Be thorough but constructive in your review.",
      task = input.state.task(),
      agents = agents.join(", "),
      validation_score = number(StageKind::Validator, "overallScore"),
      success_rate = number(StageKind::Executor, "successRate"),
      synthesis = input
        .prior_str(StageKind::Synthesizer, "fullSynthesis")
        .unwrap_or("Not available"),
      issues = count(StageKind::Validator, "issues"),
      suggestions = count(StageKind::Validator, "suggestions"),
    ))
  }

  fn interpret(&self, response: &str, input: &StageInput<'_>) -> anyhow::Result<Value> {
    let quality_score = Self::quality_score(response);
    let task_completed = quality_score >= COMPLETION_THRESHOLD;
    let strengths = section_items(response, &["strength", "positive"], 8);
    let recommendations = section_items(response, &["recommendation", "suggest"], 6);
    let summary = Self::pipeline_summary(input);

    let final_result = json!({
      "summary": input.prior_str(StageKind::Synthesizer, "summary").unwrap_or("Task completed"),
      "keyTakeaways": input.prior_list(StageKind::Synthesizer, "keyTakeaways"),
      "detailedOutput": input.prior_str(StageKind::Synthesizer, "fullSynthesis").unwrap_or(""),
      "qualityScore": quality_score,
      "taskCompleted": task_completed,
      "strengths": strengths,
      "recommendations": recommendations,
      "pipelineSummary": summary,
    });

    Ok(json!({
      "qualityScore": quality_score,
      "strengths": strengths,
      "areasForImprovement": keyword_lines(
        response,
        &["improve", "enhancement", "could be better", "area for improvement", "weakness"],
        15,
        8
      ),
      "recommendations": recommendations,
      "taskCompleted": task_completed,
      "pipelineSummary": summary,
      "fullReview": response,
      "finalResult": final_result,
    }))
  }

  fn summarize(&self, output: &Value) -> String {
    let score = output.get("qualityScore").and_then(Value::as_f64).unwrap_or(0.0);
    format!("Review completed: Overall quality score {:.2}", score)
  }
}
