// agentline/src/stage/validator.rs

use super::logic::{StageInput, StageLogic, StageWork};
use super::text::{keyword_lines, labelled_score, strip_bullet};
use crate::config::DEFAULT_MIN_SCORE;
use crate::core::control::StageKind;
use serde_json::{json, Map, Value};

/// Scores the synthesis against five quality criteria.
///
/// The pass/fail decision against the configured threshold and the retry request are
/// made by the stage contract, not here; `passed` below uses the default threshold.
#[derive(Debug, Default, Clone)]
pub struct ValidatorLogic;

const CRITERIA: [&str; 5] = ["accuracy", "completeness", "coherence", "relevance", "quality"];
const ISSUE_KEYWORDS: [&str; 6] = ["error", "issue", "problem", "concern", "missing", "incorrect"];
const SUGGESTION_KEYWORDS: [&str; 5] = ["suggest", "recommend", "improve", "could", "should consider"];
/// Score assumed for a criterion the response does not mention.
const UNSTATED_CRITERION_SCORE: f64 = 0.7;

impl ValidatorLogic {
  fn criteria_scores(text: &str) -> Map<String, Value> {
    CRITERIA
      .iter()
      .map(|criterion| {
        let score = labelled_score(text, criterion).unwrap_or(UNSTATED_CRITERION_SCORE);
        (criterion.to_string(), json!(score))
      })
      .collect()
  }

  fn issues(text: &str) -> Vec<Value> {
    text
      .lines()
      .filter_map(|line| {
        let lower = line.to_lowercase();
        if !ISSUE_KEYWORDS.iter().any(|k| lower.contains(k)) {
          return None;
        }
        let severity = if lower.contains("critical") || lower.contains("error") {
          "critical"
        } else {
          "minor"
        };
        Some(json!({"description": strip_bullet(line), "severity": severity}))
      })
      .take(10)
      .collect()
  }
}

impl StageLogic for ValidatorLogic {
  fn role_description(&self) -> &str {
    "validate results, ensure quality standards, check for accuracy and completeness, and identify any issues or improvements needed"
  }

  fn prepare(&self, input: &StageInput<'_>) -> StageWork {
    StageWork::Prompt(format!(
      "Task: {task}

SYNTHESIS TO VALIDATE:
{synthesis}

Validate the synthesis against the following criteria:

1. **Accuracy**: Is the information correct and well-supported?
2. **Completeness**: Does it address all aspects of the task?
3. **Coherence**: Is it logically structured and easy to understand?
4. **Relevance**: Is all information relevant to the task?
5. **Quality**: Does it meet professional standards?

For each criterion, provide:
- Score (0-1)
- Assessment
- Issues found (if any)
- Suggestions for improvement

Also identify:
- Critical errors that must be fixed
- Minor issues that could be improved
- Strengths and positive aspects

Provide your validation in a structured format with clear scores and feedback.",
      task = input.state.task(),
      synthesis = input
        .prior_str(StageKind::Synthesizer, "fullSynthesis")
        .unwrap_or("Not available"),
    ))
  }

  fn interpret(&self, response: &str, input: &StageInput<'_>) -> anyhow::Result<Value> {
    let scores = Self::criteria_scores(response);
    let overall = if scores.is_empty() {
      0.5
    } else {
      scores.values().filter_map(Value::as_f64).sum::<f64>() / scores.len() as f64
    };
    let issues = Self::issues(response);
    let critical: Vec<&Value> = issues.iter().filter(|i| i["severity"] == "critical").collect();
    let validated: Vec<&str> = input.prior.keys().map(|k| k.as_str()).collect();

    Ok(json!({
      "overallScore": overall,
      "criteriaScores": scores,
      "criticalErrors": critical,
      "issues": issues,
      "suggestions": keyword_lines(response, &SUGGESTION_KEYWORDS, 15, 8),
      "passed": overall >= DEFAULT_MIN_SCORE,
      "fullValidation": response,
      "validatedComponents": validated,
    }))
  }

  fn summarize(&self, output: &Value) -> String {
    let score = output.get("overallScore").and_then(Value::as_f64).unwrap_or(0.0);
    let verdict = if output.get("passed").and_then(Value::as_bool).unwrap_or(false) {
      "passed"
    } else {
      "failed"
    };
    format!("Validation {}: Score {:.2}", verdict, score)
  }
}
