// agentline/src/graph/topology.rs

//! The fixed shape of the line. Nothing here executes; the walk consults `Node::successor`
//! for the static edges and the router for the one branch point.

use crate::core::control::{Route, StageKind};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
  Stage(StageKind),
  Router,
  End,
}

impl Node {
  pub const ENTRY: Node = Node::Stage(StageKind::Planner);

  pub fn name(&self) -> &'static str {
    match self {
      Node::Stage(kind) => kind.as_str(),
      Node::Router => "router",
      Node::End => "end",
    }
  }

  /// The unconditional next node, or `None` at the router (which decides) and at `End`.
  pub fn successor(&self) -> Option<Node> {
    match self {
      Node::Stage(kind) => Some(match kind {
        StageKind::Planner => Node::Router,
        StageKind::Researcher => Node::Stage(StageKind::Analyzer),
        StageKind::Analyzer => Node::Stage(StageKind::Synthesizer),
        StageKind::Synthesizer => Node::Stage(StageKind::Validator),
        StageKind::Validator => Node::Router,
        StageKind::Executor => Node::Stage(StageKind::Reviewer),
        StageKind::Reviewer => Node::End,
      }),
      Node::Router | Node::End => None,
    }
  }
}

impl From<Route> for Node {
  fn from(route: Route) -> Self {
    match route {
      Route::Researcher => Node::Stage(StageKind::Researcher),
      Route::Executor => Node::Stage(StageKind::Executor),
      Route::End => Node::End,
    }
  }
}

impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// One edge of the topology. `label` is set on the router's conditional edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
  pub from: Node,
  pub to: Node,
  pub label: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Graph {
  pub entry: Node,
  pub edges: Vec<Edge>,
}

impl Graph {
  pub fn standard() -> Self {
    let mut edges: Vec<Edge> = StageKind::ALL
      .iter()
      .map(|kind| Node::Stage(*kind))
      .filter_map(|from| from.successor().map(|to| Edge { from, to, label: None }))
      .collect();
    for route in [Route::Researcher, Route::Executor, Route::End] {
      edges.push(Edge {
        from: Node::Router,
        to: route.into(),
        label: Some(route.as_str()),
      });
    }
    Self {
      entry: Node::ENTRY,
      edges,
    }
  }

  /// Mermaid flowchart of the topology.
  pub fn to_mermaid(&self) -> String {
    let mut out = String::from("graph TD\n");
    out.push_str(&format!("  __start__([start]) --> {}\n", self.entry));
    for edge in &self.edges {
      let to = match edge.to {
        Node::End => "__end__([end])".to_string(),
        other => other.to_string(),
      };
      match edge.label {
        Some(label) => out.push_str(&format!("  {} -. {} .-> {}\n", edge.from, label, to)),
        None => out.push_str(&format!("  {} --> {}\n", edge.from, to)),
      }
    }
    out
  }
}
