// core/src/workflow/registry.rs

use super::context_data::ContextData;
use super::control::PipelineOutcome;
use super::pipeline::Pipeline;
use crate::error::WorkflowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error};

#[async_trait]
trait ErasedPipeline<E>: Send + Sync {
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<PipelineOutcome, E>;
}

struct Registered<T, PE, E>
where
  T: Send + Sync + 'static,
  PE: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pipeline: Pipeline<T, PE>,
  _app_err: PhantomData<fn() -> E>,
}

#[async_trait]
impl<T, PE, E> ErasedPipeline<E> for Registered<T, PE, E>
where
  T: Send + Sync + 'static,
  PE: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
  E: From<PE> + From<WorkflowError> + Send + 'static,
{
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<PipelineOutcome, E> {
    let ctx = match ctx.downcast::<ContextData<T>>() {
      Ok(ctx) => *ctx,
      Err(_) => {
        return Err(E::from(WorkflowError::ContextMismatch {
          expected_type: type_name::<T>().to_string(),
        }))
      }
    };
    self.pipeline.run(ctx).await.map_err(E::from)
  }
}

/// One pipeline per context type. Run results come back as `E`.
pub struct Workflows<E = WorkflowError> {
  pipelines: Mutex<HashMap<TypeId, Arc<dyn ErasedPipeline<E>>>>,
}

impl<E> Default for Workflows<E> {
  fn default() -> Self {
    Self {
      pipelines: Mutex::new(HashMap::new()),
    }
  }
}

impl<E> Workflows<E>
where
  E: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `pipeline` for context `T`, replacing any earlier one.
  pub fn register<T, PE>(&self, pipeline: Pipeline<T, PE>)
  where
    T: Send + Sync + 'static,
    PE: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
    E: From<PE>,
  {
    debug!(context = %type_name::<T>(), steps = ?pipeline.step_names(), "Registering pipeline.");
    let registered: Registered<T, PE, E> = Registered {
      pipeline,
      _app_err: PhantomData,
    };
    self.pipelines.lock().insert(TypeId::of::<T>(), Arc::new(registered));
  }

  pub fn is_registered<T: 'static>(&self) -> bool {
    self.pipelines.lock().contains_key(&TypeId::of::<T>())
  }

  /// Runs the pipeline registered for `T`.
  pub async fn run<T>(&self, ctx: ContextData<T>) -> Result<PipelineOutcome, E>
  where
    T: Send + Sync + 'static,
  {
    let pipeline = self.pipelines.lock().get(&TypeId::of::<T>()).cloned();
    let Some(pipeline) = pipeline else {
      error!(context = %type_name::<T>(), "No pipeline registered.");
      return Err(E::from(WorkflowError::NotRegistered {
        context_type: type_name::<T>().to_string(),
      }));
    };
    pipeline.run_erased(Box::new(ctx)).await
  }
}
