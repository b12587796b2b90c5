// agentline/src/stage/analyzer.rs

use super::logic::{StageInput, StageLogic, StageWork};
use super::text::{bullets, is_bullet, strip_bullet};
use crate::core::control::StageKind;
use regex::Regex;
use serde_json::{json, Value};

/// Turns research findings into insights, patterns, implications, gaps and recommendations.
#[derive(Debug, Default, Clone)]
pub struct AnalyzerLogic;

#[derive(Debug, Default, PartialEq)]
struct Sections {
  patterns: Vec<String>,
  implications: Vec<String>,
  gaps: Vec<String>,
  recommendations: Vec<String>,
}

impl AnalyzerLogic {
  /// Bullets are filed under the most recent `<heading>:` line that names a section.
  fn sections(text: &str) -> Sections {
    let mut sections = Sections::default();
    let mut current_name: Option<&'static str> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
      let lower = line.to_lowercase();
      if line.contains(':') {
        let heading = if lower.contains("pattern") {
          Some("patterns")
        } else if lower.contains("implication") {
          Some("implications")
        } else if lower.contains("gap") {
          Some("gaps")
        } else if lower.contains("recommendation") {
          Some("recommendations")
        } else {
          None
        };
        if heading.is_some() {
          current_name = heading;
          continue;
        }
      }
      if !is_bullet(line) {
        continue;
      }
      let bucket = match current_name {
        Some("patterns") => &mut sections.patterns,
        Some("implications") => &mut sections.implications,
        Some("gaps") => &mut sections.gaps,
        Some("recommendations") => &mut sections.recommendations,
        _ => continue,
      };
      bucket.push(strip_bullet(line).to_string());
    }
    sections
  }

  fn confidence(analysis: &str) -> f64 {
    let lower = analysis.to_lowercase();
    let mut score: f64 = 0.5;
    if ["insight", "pattern", "recommendation"].iter().any(|k| lower.contains(k)) {
      score += 0.2;
    }
    if ["evidence", "data shows", "according to"].iter().any(|m| analysis.contains(m)) {
      score += 0.15;
    }
    let quantitative = Regex::new(r"\d+%|\d+\.\d+").map_or(false, |re| re.is_match(analysis));
    if quantitative {
      score += 0.15;
    }
    score.min(1.0)
  }
}

impl StageLogic for AnalyzerLogic {
  fn role_description(&self) -> &str {
    "analyze data and information, identify patterns, extract insights, and provide data-driven recommendations"
  }

  fn prepare(&self, input: &StageInput<'_>) -> StageWork {
    StageWork::Prompt(format!(
      "Task: {task}

Research Findings:
{research}

Analyze the research findings and provide:

1. **Key Insights**: What are the most important findings?
2. **Patterns**: What patterns or trends do you observe?
3. **Implications**: What do these findings mean for the task?
4. **Gaps**: What information is missing or unclear?
5. **Recommendations**: What actions or next steps are suggested?

Provide a thorough analysis with:
- Clear categorization of insights
- Evidence-based reasoning
- Actionable recommendations
- Confidence levels for each insight",
      task = input.state.task(),
      research = input
        .prior_str(StageKind::Researcher, "fullResearch")
        .unwrap_or("No research available"),
    ))
  }

  fn interpret(&self, response: &str, _input: &StageInput<'_>) -> anyhow::Result<Value> {
    let sections = Self::sections(response);
    Ok(json!({
      "insights": bullets(response, 20, 15),
      "patterns": sections.patterns,
      "implications": sections.implications,
      "gaps": sections.gaps,
      "recommendations": sections.recommendations,
      "fullAnalysis": response,
      "confidenceScore": Self::confidence(response),
    }))
  }

  fn summarize(&self, output: &Value) -> String {
    let insights = output.get("insights").and_then(Value::as_array).map_or(0, Vec::len);
    format!("Analysis completed: {} insights identified", insights)
  }
}
