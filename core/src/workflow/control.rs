// core/src/workflow/control.rs

/// Returned by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  Continue,
  /// Halt the pipeline. Remaining handlers and steps do not run.
  Stop,
}

/// How a pipeline run ended when no handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
  Completed,
  /// A handler returned [`StepControl::Stop`]. The context says why.
  Stopped,
}
