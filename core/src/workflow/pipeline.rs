// core/src/workflow/pipeline.rs

use super::context_data::ContextData;
use super::control::{PipelineOutcome, StepControl};
use crate::error::WorkflowError;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, instrument, Instrument};

pub type Handler<T, E> =
  Box<dyn Fn(ContextData<T>) -> Pin<Box<dyn Future<Output = Result<StepControl, E>> + Send>> + Send + Sync>;

/// Evaluated before a step runs; `true` skips the step.
pub type SkipCondition<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct StepDef<T> {
  name: String,
  optional: bool,
  skip_if: Option<SkipCondition<T>>,
}

impl<T> fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("has_skip_if", &self.skip_if.is_some())
      .finish()
  }
}

#[derive(Clone, Copy)]
enum Phase {
  Before,
  On,
  After,
}

impl Phase {
  fn name(self) -> &'static str {
    match self {
      Phase::Before => "before",
      Phase::On => "on",
      Phase::After => "after",
    }
  }
}

/// Ordered steps over a context `T`, with handlers failing as `E`.
pub struct Pipeline<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  steps: Vec<StepDef<T>>,
  before: HashMap<String, Vec<Handler<T, E>>>,
  on: HashMap<String, Vec<Handler<T, E>>>,
  after: HashMap<String, Vec<Handler<T, E>>>,
}

impl<T, E> Pipeline<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// `steps` lists `(name, optional)` in execution order. A required step with no
  /// handlers fails the run with [`WorkflowError::MissingHandler`].
  pub fn new(steps: &[(&str, bool)]) -> Self {
    Self {
      steps: steps
        .iter()
        .map(|(name, optional)| StepDef {
          name: (*name).to_string(),
          optional: *optional,
          skip_if: None,
        })
        .collect(),
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  /// # Panics
  ///
  /// If `step_name` is not one of the pipeline's steps. This is a wiring mistake
  /// caught when the pipeline is built, never at request time.
  pub fn skip_if(&mut self, step_name: &str, condition: impl Fn(&T) -> bool + Send + Sync + 'static) {
    let step = self.step_mut(step_name);
    step.skip_if = Some(Arc::new(condition));
  }

  /// Registers a handler that runs before the step's `on` handlers.
  ///
  /// # Panics
  ///
  /// If `step_name` is unknown.
  pub fn before<F, HandlerErr>(&mut self, step_name: &str, handler: impl Fn(ContextData<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<E> + Send + 'static,
  {
    let boxed = Self::boxed(handler);
    self.step_mut(step_name);
    self.before.entry(step_name.to_string()).or_default().push(boxed);
  }

  /// Registers the step's main handler. Several may be added; they run in order.
  ///
  /// # Panics
  ///
  /// If `step_name` is unknown.
  pub fn on<F, HandlerErr>(&mut self, step_name: &str, handler: impl Fn(ContextData<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<E> + Send + 'static,
  {
    let boxed = Self::boxed(handler);
    self.step_mut(step_name);
    self.on.entry(step_name.to_string()).or_default().push(boxed);
  }

  /// # Panics
  ///
  /// If `step_name` is unknown.
  pub fn after<F, HandlerErr>(&mut self, step_name: &str, handler: impl Fn(ContextData<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<E> + Send + 'static,
  {
    let boxed = Self::boxed(handler);
    self.step_mut(step_name);
    self.after.entry(step_name.to_string()).or_default().push(boxed);
  }

  fn boxed<F, HandlerErr>(handler: impl Fn(ContextData<T>) -> F + Send + Sync + 'static) -> Handler<T, E>
  where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<E> + Send + 'static,
  {
    Box::new(move |ctx| -> Pin<Box<dyn Future<Output = Result<StepControl, E>> + Send>> {
      let fut = handler(ctx);
      Box::pin(async move { fut.await.map_err(Into::into) })
    })
  }

  fn step_mut(&mut self, step_name: &str) -> &mut StepDef<T> {
    match self.steps.iter_mut().find(|s| s.name == step_name) {
      Some(step) => step,
      None => panic!("pipeline has no step named '{}'", step_name),
    }
  }

  fn has_handlers(&self, step_name: &str) -> bool {
    [&self.before, &self.on, &self.after]
      .iter()
      .any(|phase| phase.get(step_name).is_some_and(|h| !h.is_empty()))
  }

  /// Runs every step against `ctx`.
  #[instrument(
    name = "pipeline::run",
    skip_all,
    fields(context = %std::any::type_name::<T>(), steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx: ContextData<T>) -> Result<PipelineOutcome, E> {
    for (index, step) in self.steps.iter().enumerate() {
      let span = info_span!("step", name = %step.name, index);

      if let Some(condition) = &step.skip_if {
        let skip = {
          let data = ctx.read();
          condition(&*data)
        };
        if skip {
          span.in_scope(|| debug!("Skip condition met."));
          continue;
        }
      }

      if !self.has_handlers(&step.name) {
        if step.optional {
          continue;
        }
        span.in_scope(|| error!("Required step has no handlers."));
        return Err(E::from(WorkflowError::MissingHandler {
          step_name: step.name.clone(),
        }));
      }

      for (phase, table) in [(Phase::Before, &self.before), (Phase::On, &self.on), (Phase::After, &self.after)] {
        let Some(handlers) = table.get(&step.name) else {
          continue;
        };
        let control = run_phase(phase, handlers, &ctx).instrument(span.clone()).await?;
        if control == StepControl::Stop {
          span.in_scope(|| info!(phase = phase.name(), "Pipeline stopped by handler."));
          return Ok(PipelineOutcome::Stopped);
        }
      }
    }
    Ok(PipelineOutcome::Completed)
  }
}

async fn run_phase<T, E>(phase: Phase, handlers: &[Handler<T, E>], ctx: &ContextData<T>) -> Result<StepControl, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error,
{
  for handler in handlers {
    match handler(ctx.clone()).await {
      Ok(StepControl::Continue) => {}
      Ok(StepControl::Stop) => return Ok(StepControl::Stop),
      Err(e) => {
        error!(phase = phase.name(), error = %e, "Handler failed.");
        return Err(e);
      }
    }
  }
  Ok(StepControl::Continue)
}
