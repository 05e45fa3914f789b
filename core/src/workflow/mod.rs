// core/src/workflow/mod.rs

//! A small async step-pipeline engine.
//!
//! A [`Pipeline`] is an ordered list of named steps over one shared context type.
//! Each step runs its `before`, `on` and `after` handlers in order; any handler can
//! stop the run early by returning [`StepControl::Stop`]. [`Workflows`] keeps one
//! pipeline per context type so request handlers only build a context and ask for
//! it to be run.

mod context_data;
mod control;
mod pipeline;
mod registry;

pub use context_data::ContextData;
pub use control::{PipelineOutcome, StepControl};
pub use pipeline::{Handler, Pipeline, SkipCondition};
pub use registry::Workflows;
