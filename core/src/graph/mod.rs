// agentline/src/graph/mod.rs

//! The fixed graph of stages, the router at its branch point, and the executor that walks it.

pub mod orchestrator;
pub mod router;
pub mod topology;
pub mod walk;

pub use orchestrator::Orchestrator;
pub use router::Router;
pub use topology::{Edge, Graph, Node};
pub use walk::Walk;
