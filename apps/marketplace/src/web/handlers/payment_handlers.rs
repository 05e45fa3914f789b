// apps/marketplace/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::{ContextData, PipelineOutcome};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::pipelines::contexts::VerifyPaymentCtxData;
use crate::state::AppState;

#[instrument(name = "handler::verify_payment", skip(app_state, path), fields(reference = %path.as_str()))]
pub async fn verify_payment_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
  let reference = path.into_inner();
  let ctx = ContextData::new(VerifyPaymentCtxData::new(app_state.get_ref().clone(), reference.clone()));
  let outcome = app_state.workflows.run(ctx.clone()).await?;

  let data = ctx.read();
  let payment = data
    .payment
    .as_ref()
    .ok_or_else(|| AppError::Internal(format!("Payment {} not loaded.", reference)))?;
  info!(?outcome, status = %payment.status, settlement = ?data.settlement, "Payment verified.");

  Ok(HttpResponse::Ok().json(json!({
    "reference": payment.reference,
    "status": payment.status,
    "amount": payment.amount,
    "settlement": data.settlement,
  })))
}
