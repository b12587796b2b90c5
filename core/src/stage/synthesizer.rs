// agentline/src/stage/synthesizer.rs

use super::logic::{or_unavailable, StageInput, StageLogic, StageWork};
use super::text::{keyword_lines, leading_summary, section_items, strip_enumeration};
use crate::core::control::StageKind;
use serde_json::{json, Value};

/// Folds plan, research and analysis into one answer with follow-up work.
#[derive(Debug, Default, Clone)]
pub struct SynthesizerLogic;

const ACTION_KEYWORDS: [&str; 6] = ["should", "must", "need to", "recommend", "action", "step"];

impl SynthesizerLogic {
  fn takeaways(text: &str) -> Vec<String> {
    text
      .lines()
      .map(str::trim)
      .filter(|line| line.starts_with(['-', '*', '•']) || line.starts_with("1.") || line.starts_with("2.") || line.starts_with("3."))
      .map(strip_enumeration)
      .filter(|item| item.chars().count() > 15)
      .take(10)
      .map(str::to_string)
      .collect()
  }

  fn integrated_insights(input: &StageInput<'_>) -> Vec<Value> {
    let from_analysis = input
      .prior_list(StageKind::Analyzer, "insights")
      .into_iter()
      .take(5)
      .map(|insight| json!({"source": "analyzer", "insight": insight, "priority": "high"}));
    let from_research = input
      .prior_list(StageKind::Researcher, "keyPoints")
      .into_iter()
      .take(3)
      .map(|point| json!({"source": "researcher", "insight": point, "priority": "medium"}));
    from_analysis.chain(from_research).collect()
  }

  /// Share of the upstream stages whose output was available.
  fn completeness(input: &StageInput<'_>) -> f64 {
    let expected = [StageKind::Planner, StageKind::Researcher, StageKind::Analyzer];
    let present = expected.iter().filter(|k| input.prior(**k).is_some()).count();
    present as f64 / expected.len() as f64
  }
}

impl StageLogic for SynthesizerLogic {
  fn role_description(&self) -> &str {
    "synthesize information from multiple sources, integrate insights, and create coherent summaries and conclusions"
  }

  fn prepare(&self, input: &StageInput<'_>) -> StageWork {
    let key_points: Vec<String> = input.prior_list(StageKind::Researcher, "keyPoints").into_iter().take(5).collect();
    let insights: Vec<String> = input.prior_list(StageKind::Analyzer, "insights").into_iter().take(5).collect();
    let recommendations: Vec<String> = input
      .prior_list(StageKind::Analyzer, "recommendations")
      .into_iter()
      .take(3)
      .collect();

    StageWork::Prompt(format!(
      "Task: {task}

You have the following information from different agents:

EXECUTION PLAN:
{plan}

RESEARCH FINDINGS:
{research}
Key Points: {key_points}

ANALYSIS:
Insights: {insights}
Recommendations: {recommendations}

Your task is to synthesize all this information into a coherent, comprehensive response that:

1. **Integrates** findings from all agents
2. **Highlights** the most important points
3. **Resolves** any conflicts or contradictions
4. **Provides** a clear, actionable summary
5. **Identifies** next steps or conclusions

Create a well-structured synthesis that combines all the information logically and coherently.",
      task = input.state.task(),
      plan = or_unavailable(input.prior_str(StageKind::Planner, "taskAnalysis")),
      research = or_unavailable(input.prior_str(StageKind::Researcher, "summary")),
      key_points = key_points.join(", "),
      insights = insights.join(", "),
      recommendations = recommendations.join(", "),
    ))
  }

  fn interpret(&self, response: &str, input: &StageInput<'_>) -> anyhow::Result<Value> {
    let sources: Vec<&str> = input.prior.keys().map(|k| k.as_str()).collect();
    Ok(json!({
      "summary": leading_summary(response, 10, 200),
      "keyTakeaways": Self::takeaways(response),
      "integratedInsights": Self::integrated_insights(input),
      "actionableItems": keyword_lines(response, &ACTION_KEYWORDS, 10, 8),
      "nextSteps": section_items(response, &["next step", "next action"], 5),
      "fullSynthesis": response,
      "sources": sources,
      "completenessScore": Self::completeness(input),
    }))
  }

  fn summarize(&self, output: &Value) -> String {
    let count = |field: &str| output.get(field).and_then(Value::as_array).map_or(0, Vec::len);
    format!(
      "Synthesis completed: {} takeaways, {} actionable items",
      count("keyTakeaways"),
      count("actionableItems")
    )
  }
}
