// apps/marketplace/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::order::Delivery;
use bazaar::{ContextData, PipelineOutcome};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::pipelines::contexts::CheckoutCtxData;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug, Default)]
pub struct CheckoutPayload {
  #[serde(default)]
  pub delivery: Delivery,
}

/// Turns the buyer's cart into an order and opens the split charge for it.
///
/// Responds with where to send the buyer to pay, and the amounts charged in kobo.
#[instrument(name = "handler::checkout", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn start_checkout_handler(
  app_state: web::Data<AppState>,
  payload: Option<web::Json<CheckoutPayload>>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse> {
  let payload = payload.map(web::Json::into_inner).unwrap_or_default();
  if let Delivery::Delivery { address, phone } = &payload.delivery {
    if address.trim().is_empty() || phone.trim().is_empty() {
      return Err(AppError::Validation("Delivery needs an address and a phone number.".to_string()));
    }
  }

  let ctx = ContextData::new(CheckoutCtxData::new(app_state.get_ref().clone(), auth_user.user_id, payload.delivery));
  if app_state.workflows.run(ctx.clone()).await? == PipelineOutcome::Stopped {
    return Err(AppError::Internal("Checkout stopped before completing.".to_string()));
  }

  let data = ctx.read();
  let (Some(order), Some(plan), Some(authorization)) = (&data.order, &data.plan, &data.authorization) else {
    return Err(AppError::Internal("Checkout completed without an order or authorization.".to_string()));
  };
  let amount = plan.total()?;
  info!(reference = %order.reference, %amount, "Checkout started.");

  Ok(HttpResponse::Created().json(json!({
    "order_id": order.id,
    "reference": order.reference,
    "authorization_url": authorization.authorization_url,
    "access_code": authorization.access_code,
    "amount": amount,
    "fee": plan.fee,
    "subtotal": plan.subtotal,
  })))
}
