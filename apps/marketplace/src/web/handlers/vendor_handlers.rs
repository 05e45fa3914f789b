// apps/marketplace/src/web/handlers/vendor_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::store::CatalogStore;
use bazaar::subscription::PlanChange;
use bazaar::{ContextData, PipelineOutcome};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::pipelines::contexts::{ListProductCtxData, OnboardVendorCtxData, PlanChangeCtxData, RenewalCtxData};
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct OnboardVendorPayload {
  pub store_name: String,
  pub email: String,
  pub payout_account: Option<String>,
  pub plan_id: Uuid,
}

#[derive(Deserialize, Debug)]
pub struct ListProductPayload {
  pub name: String,
  pub description: Option<String>,
  /// Naira, e.g. `"2500.00"`.
  pub unit_price: Decimal,
  #[serde(default)]
  pub stock_quantity: i32,
}

#[derive(Deserialize, Debug)]
pub struct PlanChangePayload {
  pub plan_id: Uuid,
  #[serde(default)]
  pub immediate: bool,
}

fn completed(outcome: PipelineOutcome, operation: &str) -> Result<()> {
  match outcome {
    PipelineOutcome::Completed => Ok(()),
    PipelineOutcome::Stopped => Err(AppError::Internal(format!("{} stopped before completing.", operation))),
  }
}

#[instrument(name = "handler::onboard_vendor", skip(app_state, payload), fields(plan_id = %payload.plan_id))]
pub async fn onboard_vendor_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<OnboardVendorPayload>,
) -> Result<HttpResponse> {
  let payload = payload.into_inner();
  let ctx = ContextData::new(OnboardVendorCtxData {
    app_state: app_state.get_ref().clone(),
    store_name: payload.store_name,
    email: payload.email,
    payout_account: payload.payout_account,
    plan_id: payload.plan_id,
    plan: None,
    vendor: None,
  });
  completed(app_state.workflows.run(ctx.clone()).await?, "Vendor onboarding")?;

  let data = ctx.read();
  let vendor = data
    .vendor
    .as_ref()
    .ok_or_else(|| AppError::Internal("Onboarding completed without a vendor.".to_string()))?;
  Ok(HttpResponse::Created().json(json!({ "vendor": vendor })))
}

#[instrument(name = "handler::list_product", skip(app_state, path, payload), fields(vendor_id = %path.as_ref()))]
pub async fn list_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<ListProductPayload>,
) -> Result<HttpResponse> {
  let payload = payload.into_inner();
  let ctx = ContextData::new(ListProductCtxData {
    app_state: app_state.get_ref().clone(),
    vendor_id: path.into_inner(),
    name: payload.name,
    description: payload.description,
    unit_price: payload.unit_price,
    stock_quantity: payload.stock_quantity,
    product: None,
  });
  completed(app_state.workflows.run(ctx.clone()).await?, "Product listing")?;

  let data = ctx.read();
  let product = data
    .product
    .as_ref()
    .ok_or_else(|| AppError::Internal("Listing completed without a product.".to_string()))?;
  Ok(HttpResponse::Created().json(json!({ "product": product })))
}

/// Evaluated subscription state. Stored status is not rewritten here; the
/// evaluation is what listing and plan changes act on.
#[instrument(name = "handler::vendor_subscription", skip(app_state, path), fields(vendor_id = %path.as_ref()))]
pub async fn subscription_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
  let vendor_id = path.into_inner();
  let vendor = app_state
    .store
    .vendor(vendor_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Vendor {} not found.", vendor_id)))?;
  let plan = app_state
    .store
    .plan(vendor.plan_id)
    .await?
    .ok_or_else(|| AppError::Internal(format!("Vendor {} is on unknown plan {}.", vendor_id, vendor.plan_id)))?;
  let active_products = app_state.store.active_product_count(vendor_id).await?;

  let policy = &app_state.config.subscription;
  let now = Utc::now();
  let status = policy.evaluate(vendor.subscription_status, vendor.subscription_expires_at, now);

  Ok(HttpResponse::Ok().json(json!({
    "vendor_id": vendor.id,
    "plan": plan,
    "status": status,
    "expires_at": vendor.subscription_expires_at,
    "days_remaining": policy.days_remaining(vendor.subscription_expires_at, now),
    "product_quota": plan.product_quota,
    "active_products": active_products,
  })))
}

/// Quotes a plan change and applies it or opens the charge for it.
#[instrument(name = "handler::change_plan", skip(app_state, path, payload), fields(vendor_id = %path.as_ref(), plan_id = %payload.plan_id))]
pub async fn change_plan_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<PlanChangePayload>,
) -> Result<HttpResponse> {
  let ctx = ContextData::new(PlanChangeCtxData::new(
    app_state.get_ref().clone(),
    path.into_inner(),
    payload.plan_id,
    payload.immediate,
  ));
  completed(app_state.workflows.run(ctx.clone()).await?, "Plan change")?;

  let data = ctx.read();
  let quote = data
    .quote
    .as_ref()
    .ok_or_else(|| AppError::Internal("Plan change completed without a quote.".to_string()))?;
  let amount = match quote {
    PlanChange::Free => Decimal::ZERO,
    PlanChange::Charge { amount, .. } => *amount,
  };
  info!(applied = data.applied, %amount, "Plan change handled.");

  Ok(HttpResponse::Ok().json(json!({
    "change": quote,
    "amount": amount,
    "applied": data.applied,
    "plan_id": data.target_plan_id,
    "reference": data.reference,
    "authorization_url": data.authorization.as_ref().map(|a| &a.authorization_url),
  })))
}

#[instrument(name = "handler::renew_subscription", skip(app_state, path), fields(vendor_id = %path.as_ref()))]
pub async fn renew_subscription_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
  let ctx = ContextData::new(RenewalCtxData::new(app_state.get_ref().clone(), path.into_inner()));
  completed(app_state.workflows.run(ctx.clone()).await?, "Renewal")?;

  let data = ctx.read();
  let renewed = data.authorization.is_none();
  Ok(HttpResponse::Ok().json(json!({
    "amount": data.amount,
    "renewed": renewed,
    "expires_at": data.vendor.as_ref().map(|v| v.subscription_expires_at),
    "reference": data.reference,
    "authorization_url": data.authorization.as_ref().map(|a| &a.authorization_url),
  })))
}
