// core/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Failures raised by the workflow engine itself, as opposed to the handlers it runs.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("Required step '{step_name}' has no handlers")]
  MissingHandler { step_name: String },

  #[error("No pipeline registered for context type {context_type}")]
  NotRegistered { context_type: String },

  #[error("Context handed to the registry is not a ContextData<{expected_type}>")]
  ContextMismatch { expected_type: String },

  #[error("Step handler failed: {source}")]
  Handler {
    #[source]
    source: AnyhowError,
  },
}

impl From<AnyhowError> for WorkflowError {
  fn from(source: AnyhowError) -> Self {
    WorkflowError::Handler { source }
  }
}
