// apps/marketplace/src/pipelines/subscription_pipeline.rs

//! Vendor plan changes and renewals.

use crate::errors::{AppError, Result};
use crate::pipelines::common_steps::{activate_plan, open_subscription_payment};
use crate::pipelines::contexts::{PlanChangeCtxData, RenewalCtxData};
use crate::state::AppState;
use bazaar::catalog::VendorProfile;
use bazaar::payment::PaymentPurpose;
use bazaar::store::CatalogStore;
use bazaar::subscription::{quote_plan_change, PlanChange, SubscriptionError, SubscriptionStatus, VendorPlan};
use bazaar::{ContextData, Kobo, Pipeline, StepControl, Workflows};
use tracing::{info, instrument};
use uuid::Uuid;

pub fn register_plan_change_pipeline(workflows: &Workflows<AppError>) {
  let mut p = Pipeline::<PlanChangeCtxData, AppError>::new(&[
    ("load_subscription", false),
    ("quote", false),
    ("apply_now", false),
    ("open_charge", false),
  ]);

  p.skip_if("apply_now", |data: &PlanChangeCtxData| {
    !data.quote.as_ref().is_some_and(PlanChange::applies_now)
  });
  p.skip_if("open_charge", |data: &PlanChangeCtxData| !data.charges());

  p.on("load_subscription", load_plan_change_subscription);
  p.on("quote", quote);
  p.on("apply_now", apply_now);
  p.on("open_charge", open_upgrade_charge);

  workflows.register(p);
}

pub fn register_renewal_pipeline(workflows: &Workflows<AppError>) {
  let mut p = Pipeline::<RenewalCtxData, AppError>::new(&[
    ("load_subscription", false),
    ("extend_free_plan", false),
    ("open_charge", false),
  ]);

  p.skip_if("extend_free_plan", |data: &RenewalCtxData| !data.amount.is_zero());
  p.skip_if("open_charge", |data: &RenewalCtxData| data.amount.is_zero());

  p.on("load_subscription", load_renewal_subscription);
  p.on("extend_free_plan", extend_free_plan);
  p.on("open_charge", open_renewal_charge);

  workflows.register(p);
}

async fn vendor_with_plan(state: &AppState, vendor_id: Uuid) -> Result<(VendorProfile, VendorPlan)> {
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
  Ok((vendor, plan))
}

// --- Plan change ---

async fn load_plan_change_subscription(ctx: ContextData<PlanChangeCtxData>) -> Result<StepControl> {
  let (state, vendor_id, target_plan_id, now) = {
    let data = ctx.read();
    (data.app_state.clone(), data.vendor_id, data.target_plan_id, data.now)
  };

  let (vendor, current_plan) = vendor_with_plan(&state, vendor_id).await?;
  let target_plan = state
    .store
    .plan(target_plan_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Plan {} not found.", target_plan_id)))?;

  let status = state
    .config
    .subscription
    .evaluate(vendor.subscription_status, vendor.subscription_expires_at, now);
  if status == SubscriptionStatus::Cancelled {
    return Err(SubscriptionError::Inactive(status).into());
  }

  let mut data = ctx.write();
  data.vendor = Some(vendor);
  data.current_plan = Some(current_plan);
  data.target_plan = Some(target_plan);
  data.status = Some(status);
  Ok(StepControl::Continue)
}

#[instrument(name = "subscription::quote", skip_all, err(Display))]
async fn quote(ctx: ContextData<PlanChangeCtxData>) -> Result<StepControl> {
  let mut data = ctx.write();
  let (Some(vendor), Some(current), Some(target)) = (&data.vendor, &data.current_plan, &data.target_plan) else {
    return Err(AppError::Internal("Plan change context incomplete before quoting.".to_string()));
  };
  let change = quote_plan_change(
    &data.app_state.config.subscription,
    current,
    target,
    vendor.subscription_expires_at,
    data.now,
    data.immediate,
  )?;
  info!(from = %current.name, to = %target.name, ?change, "Plan change quoted.");
  data.quote = Some(change);
  Ok(StepControl::Continue)
}

/// Switches the plan without waiting for payment, keeping the current cycle.
async fn apply_now(ctx: ContextData<PlanChangeCtxData>) -> Result<StepControl> {
  let (state, vendor) = {
    let data = ctx.read();
    let (Some(vendor), Some(status)) = (&data.vendor, data.status) else {
      return Err(AppError::Internal("Plan change context incomplete before applying.".to_string()));
    };
    let mut vendor = vendor.clone();
    vendor.plan_id = data.target_plan_id;
    vendor.subscription_status = status;
    (data.app_state.clone(), vendor)
  };

  state.store.update_vendor_subscription(&vendor).await?;
  info!(vendor_id = %vendor.id, plan_id = %vendor.plan_id, "Plan switched.");

  let mut data = ctx.write();
  data.vendor = Some(vendor);
  data.applied = true;
  Ok(StepControl::Continue)
}

async fn open_upgrade_charge(ctx: ContextData<PlanChangeCtxData>) -> Result<StepControl> {
  let (state, email, purpose, amount) = {
    let data = ctx.read();
    let (Some(vendor), Some(PlanChange::Charge { amount, .. })) = (&data.vendor, &data.quote) else {
      return Err(AppError::Internal("No charge quoted for the plan change.".to_string()));
    };
    let purpose = PaymentPurpose::PlanUpgrade {
      vendor_id: vendor.id,
      plan_id: data.target_plan_id,
    };
    (data.app_state.clone(), vendor.email.clone(), purpose, Kobo::from_naira(*amount)?)
  };

  let (reference, authorization) = open_subscription_payment(&state, &email, purpose, amount).await?;
  let mut data = ctx.write();
  data.reference = Some(reference);
  data.authorization = Some(authorization);
  Ok(StepControl::Continue)
}

// --- Renewal ---

async fn load_renewal_subscription(ctx: ContextData<RenewalCtxData>) -> Result<StepControl> {
  let (state, vendor_id) = {
    let data = ctx.read();
    (data.app_state.clone(), data.vendor_id)
  };

  let (vendor, plan) = vendor_with_plan(&state, vendor_id).await?;
  let amount = Kobo::from_naira(plan.price)?;

  let mut data = ctx.write();
  data.vendor = Some(vendor);
  data.plan = Some(plan);
  data.amount = amount;
  Ok(StepControl::Continue)
}

/// Free plans renew without a charge.
async fn extend_free_plan(ctx: ContextData<RenewalCtxData>) -> Result<StepControl> {
  let (state, vendor_id, plan_id) = {
    let data = ctx.read();
    let Some(plan) = &data.plan else {
      return Err(AppError::Internal("Plan not loaded before renewal.".to_string()));
    };
    (data.app_state.clone(), data.vendor_id, plan.id)
  };

  activate_plan(&state, vendor_id, plan_id, true).await?;
  let vendor = state.store.vendor(vendor_id).await?;
  if vendor.is_some() {
    ctx.write().vendor = vendor;
  }
  Ok(StepControl::Continue)
}

async fn open_renewal_charge(ctx: ContextData<RenewalCtxData>) -> Result<StepControl> {
  let (state, email, purpose, amount) = {
    let data = ctx.read();
    let (Some(vendor), Some(plan)) = (&data.vendor, &data.plan) else {
      return Err(AppError::Internal("Renewal context incomplete before charging.".to_string()));
    };
    let purpose = PaymentPurpose::Renewal {
      vendor_id: vendor.id,
      plan_id: plan.id,
    };
    (data.app_state.clone(), vendor.email.clone(), purpose, data.amount)
  };

  let (reference, authorization) = open_subscription_payment(&state, &email, purpose, amount).await?;
  let mut data = ctx.write();
  data.reference = Some(reference);
  data.authorization = Some(authorization);
  Ok(StepControl::Continue)
}
