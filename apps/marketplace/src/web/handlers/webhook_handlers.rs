// apps/marketplace/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use bazaar::signature::SIGNATURE_HEADER;
use bazaar::{ContextData, PipelineOutcome};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::Result;
use crate::pipelines::contexts::WebhookCtxData;
use crate::state::AppState;

/// Gateway event callback. The raw body is passed through untouched so the
/// signature can be checked against exactly what was sent.
#[instrument(name = "handler::paystack_webhook", skip(app_state, req, body), fields(body_len = body.len()))]
pub async fn paystack_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok())
    .map(String::from);

  let ctx = ContextData::new(WebhookCtxData::new(app_state.get_ref().clone(), body, signature));
  let outcome = app_state.workflows.run(ctx.clone()).await?;

  let data = ctx.read();
  let event = data.event.as_ref().map(|e| e.event.as_str()).unwrap_or_default();
  if outcome == PipelineOutcome::Stopped || data.ignored {
    info!(event, "Webhook acknowledged without changes.");
    return Ok(HttpResponse::Ok().json(json!({ "status": "ignored", "event": event })));
  }

  info!(event, settlement = ?data.settlement, "Webhook processed.");
  Ok(HttpResponse::Ok().json(json!({
    "status": "processed",
    "event": event,
    "settlement": data.settlement,
  })))
}
