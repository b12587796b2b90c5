// agentline/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentlineError {
  /// The stage's language-model collaborator failed. Recorded as a business failure.
  #[error("Collaborator call failed in stage '{stage}'. Source: {source}")]
  Collaborator {
    stage: String,
    #[source]
    source: AnyhowError,
  },

  /// The collaborator answered but the stage logic could not make sense of it.
  #[error("Stage '{stage}' could not interpret the collaborator response. Source: {source}")]
  Interpretation {
    stage: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Stage '{stage}' exceeded its deadline of {seconds}s")]
  Timeout { stage: String, seconds: u64 },

  /// An error escaped a stage's own handling. Fatal to the run.
  #[error("Defect in stage '{stage}': {message}")]
  StageDefect { stage: String, message: String },

  #[error("Stage instance '{instance_id}' was re-entered after reaching a terminal status")]
  StageReentered { instance_id: String },

  #[error("Graph walk exceeded the limit of {limit} node visits")]
  StepLimitExceeded { limit: usize },

  #[error("Configuration error for '{key}': {message}")]
  Configuration { key: String, message: String },

  #[error("Metrics export failed. Source: {source}")]
  MetricsExport {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal agentline error: {0}")]
  Internal(String),
}

impl AgentlineError {
  /// Business failures are recorded on the run and the walk continues.
  pub fn is_business_failure(&self) -> bool {
    matches!(
      self,
      AgentlineError::Collaborator { .. } | AgentlineError::Interpretation { .. } | AgentlineError::Timeout { .. }
    )
  }
}

impl From<AnyhowError> for AgentlineError {
  fn from(err: AnyhowError) -> Self {
    // Unwrap an AgentlineError that was carried through anyhow instead of nesting it.
    match err.downcast::<AgentlineError>() {
      Ok(inner) => inner,
      Err(err) => AgentlineError::Internal(format!("{:#}", err)),
    }
  }
}

pub type AgentlineResult<T, E = AgentlineError> = std::result::Result<T, E>;
