pub mod control;
pub mod shared;
pub mod stage_state;
pub mod state;

// Re-export key types for easier access from other agentline modules (and lib.rs)
pub use control::{Route, RunStatus, StageKind, StageStatus};
pub use shared::SharedData;
pub use stage_state::StageState;
pub use state::{ErrorRecord, Message, RunState};
