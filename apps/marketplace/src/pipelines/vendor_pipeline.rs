// apps/marketplace/src/pipelines/vendor_pipeline.rs

use crate::errors::{AppError, Result};
use crate::pipelines::contexts::{ListProductCtxData, OnboardVendorCtxData};
use bazaar::catalog::{Product, VendorProfile};
use bazaar::store::CatalogStore;
use bazaar::subscription::{ensure_can_list, SubscriptionStatus};
use bazaar::{ContextData, Kobo, Pipeline, StepControl, Workflows};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

pub fn register_onboard_vendor_pipeline(workflows: &Workflows<AppError>) {
  let mut p = Pipeline::<OnboardVendorCtxData, AppError>::new(&[
    ("validate_request", false),
    ("load_plan", false),
    ("create_vendor", false),
  ]);

  p.on("validate_request", validate_onboarding);
  p.on("load_plan", load_plan);
  p.on("create_vendor", create_vendor);

  workflows.register(p);
}

pub fn register_list_product_pipeline(workflows: &Workflows<AppError>) {
  let mut p = Pipeline::<ListProductCtxData, AppError>::new(&[
    ("validate_request", false),
    ("check_quota", false),
    ("create_product", false),
  ]);

  p.on("validate_request", validate_listing);
  p.on("check_quota", check_quota);
  p.on("create_product", create_product);

  workflows.register(p);
}

// --- Onboarding ---

async fn validate_onboarding(ctx: ContextData<OnboardVendorCtxData>) -> Result<StepControl> {
  let mut data = ctx.write();
  data.store_name = data.store_name.trim().to_string();
  data.email = data.email.trim().to_ascii_lowercase();
  data.payout_account = data
    .payout_account
    .take()
    .map(|account| account.trim().to_string())
    .filter(|account| !account.is_empty());

  if data.store_name.is_empty() {
    return Err(AppError::Validation("Store name is required.".to_string()));
  }
  if !data.email.contains('@') {
    return Err(AppError::Validation("A valid email is required.".to_string()));
  }
  if data.payout_account.is_none() {
    warn!(store_name = %data.store_name, "Vendor has no payout account; sales will settle to the platform.");
  }
  Ok(StepControl::Continue)
}

async fn load_plan(ctx: ContextData<OnboardVendorCtxData>) -> Result<StepControl> {
  let (state, plan_id) = {
    let data = ctx.read();
    (data.app_state.clone(), data.plan_id)
  };
  let plan = state
    .store
    .plan(plan_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Plan {} not found.", plan_id)))?;
  ctx.write().plan = Some(plan);
  Ok(StepControl::Continue)
}

/// New vendors start on a trial of the chosen plan.
async fn create_vendor(ctx: ContextData<OnboardVendorCtxData>) -> Result<StepControl> {
  let (state, vendor) = {
    let data = ctx.read();
    let now = Utc::now();
    let vendor = VendorProfile {
      id: Uuid::new_v4(),
      store_name: data.store_name.clone(),
      email: data.email.clone(),
      payout_account: data.payout_account.clone(),
      plan_id: data.plan_id,
      subscription_status: SubscriptionStatus::Trial,
      subscription_expires_at: data.app_state.config.subscription.trial_expiry(now),
      created_at: now,
    };
    (data.app_state.clone(), vendor)
  };

  state.store.insert_vendor(&vendor).await?;
  info!(vendor_id = %vendor.id, expires_at = %vendor.subscription_expires_at, "Vendor onboarded on trial.");
  ctx.write().vendor = Some(vendor);
  Ok(StepControl::Continue)
}

// --- Product listing ---

async fn validate_listing(ctx: ContextData<ListProductCtxData>) -> Result<StepControl> {
  let mut data = ctx.write();
  data.name = data.name.trim().to_string();
  if data.name.is_empty() {
    return Err(AppError::Validation("Product name is required.".to_string()));
  }
  if data.stock_quantity < 0 {
    return Err(AppError::Validation("Stock must not be negative.".to_string()));
  }
  if data.unit_price.normalize().scale() > 2 {
    return Err(AppError::Validation("Price must have at most two decimal places.".to_string()));
  }
  // Rejects negative and unrepresentable prices.
  Kobo::from_naira(data.unit_price)?;
  Ok(StepControl::Continue)
}

/// The vendor must be able to sell and have room left in its plan's quota.
async fn check_quota(ctx: ContextData<ListProductCtxData>) -> Result<StepControl> {
  let (state, vendor_id) = {
    let data = ctx.read();
    (data.app_state.clone(), data.vendor_id)
  };

  let vendor = state
    .store
    .vendor(vendor_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Vendor {} not found.", vendor_id)))?;
  let plan = state
    .store
    .plan(vendor.plan_id)
    .await?
    .ok_or_else(|| AppError::Internal(format!("Vendor {} is on unknown plan {}.", vendor_id, vendor.plan_id)))?;
  let active = state.store.active_product_count(vendor_id).await?;

  ensure_can_list(&state.config.subscription, &vendor, &plan, active, Utc::now()).map_err(|e| {
    warn!(%vendor_id, plan = %plan.name, active, error = %e, "Listing refused.");
    AppError::from(e)
  })?;
  Ok(StepControl::Continue)
}

async fn create_product(ctx: ContextData<ListProductCtxData>) -> Result<StepControl> {
  let (state, product) = {
    let data = ctx.read();
    let now = Utc::now();
    let product = Product {
      id: Uuid::new_v4(),
      vendor_id: data.vendor_id,
      name: data.name.clone(),
      description: data.description.clone(),
      unit_price: data.unit_price,
      stock_quantity: data.stock_quantity,
      active: true,
      created_at: now,
      updated_at: now,
    };
    (data.app_state.clone(), product)
  };

  state.store.insert_product(&product).await?;
  info!(product_id = %product.id, vendor_id = %product.vendor_id, "Product listed.");
  ctx.write().product = Some(product);
  Ok(StepControl::Continue)
}
