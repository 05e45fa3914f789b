// apps/marketplace/src/pipelines/webhook_pipeline.rs

use crate::errors::{AppError, Result};
use crate::pipelines::common_steps::settle_and_apply;
use crate::pipelines::contexts::WebhookCtxData;
use bazaar::gateway::WebhookEvent;
use bazaar::{ContextData, Pipeline, StepControl, Workflows};
use tracing::{info, instrument, warn};

pub fn register_webhook_pipeline(workflows: &Workflows<AppError>) {
  let mut p = Pipeline::<WebhookCtxData, AppError>::new(&[
    ("verify_signature", false),
    ("parse_event", false),
    ("settle", false),
  ]);

  p.on("verify_signature", verify_signature);
  p.on("parse_event", parse_event);
  p.on("settle", settle);

  workflows.register(p);
}

/// Nothing in the body is trusted, or even parsed, until the signature matches.
#[instrument(name = "webhook::verify_signature", skip_all)]
async fn verify_signature(ctx: ContextData<WebhookCtxData>) -> Result<StepControl> {
  let data = ctx.read();
  if let Err(e) = data.app_state.verifier.verify(&data.body, data.signature.as_deref()) {
    warn!(error = %e, body_len = data.body.len(), "Rejected webhook with a bad signature.");
    return Err(e.into());
  }
  Ok(StepControl::Continue)
}

async fn parse_event(ctx: ContextData<WebhookCtxData>) -> Result<StepControl> {
  let mut data = ctx.write();
  let event = WebhookEvent::parse(&data.body).map_err(|e| AppError::Validation(e.to_string()))?;

  if !event.is_charge_event() {
    info!(event = %event.event, "Acknowledging webhook event with no handler.");
    data.ignored = true;
    data.event = Some(event);
    return Ok(StepControl::Stop);
  }
  data.event = Some(event);
  Ok(StepControl::Continue)
}

async fn settle(ctx: ContextData<WebhookCtxData>) -> Result<StepControl> {
  let (state, report) = {
    let data = ctx.read();
    let event = data
      .event
      .as_ref()
      .ok_or_else(|| AppError::Internal("Webhook event not parsed before settling.".to_string()))?;
    let report = event.charge_report().map_err(|e| AppError::Validation(e.to_string()))?;
    (data.app_state.clone(), report)
  };

  match settle_and_apply(&state, &report).await {
    Ok(settlement) => {
      info!(reference = %report.reference, ?settlement, "Webhook settled payment.");
      ctx.write().settlement = Some(settlement);
      Ok(StepControl::Continue)
    }
    // Unknown references are acknowledged so the gateway stops redelivering them.
    Err(AppError::NotFound(detail)) => {
      warn!(reference = %report.reference, %detail, "Webhook for an unknown payment.");
      ctx.write().ignored = true;
      Ok(StepControl::Stop)
    }
    Err(e) => Err(e),
  }
}
