// apps/marketplace/src/pipelines/common_steps.rs

//! Pieces shared by several pipelines.

use crate::errors::{AppError, Result};
use crate::state::AppState;
use bazaar::catalog::VendorProfile;
use bazaar::gateway::{Authorization, ChargeReport, InitializeRequest};
use bazaar::payment::{self, Payment, PaymentPurpose, Settlement};
use bazaar::store::{CatalogStore, OrderStore, PaymentStore};
use bazaar::subscription::SubscriptionStatus;
use bazaar::Kobo;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Applies a gateway report, then fulfils the payment if it is paid and its
/// effects are still outstanding.
#[instrument(name = "steps::settle_and_apply", skip_all, fields(reference = %report.reference), err(Display))]
pub async fn settle_and_apply(state: &AppState, report: &ChargeReport) -> Result<Settlement> {
  let (settlement, payment) = payment::settle(state.store.as_ref(), report).await?;
  fulfil(state, &payment).await?;
  Ok(settlement)
}

/// Applies what a paid payment bought. Each purpose is one atomic store change
/// guarded by the payment's fulfilment stamp, so a failure leaves the payment
/// unfulfilled and the next confirmation, webhook or poll, tries again.
pub async fn fulfil(state: &AppState, payment: &Payment) -> Result<()> {
  if !payment.awaits_fulfilment() {
    return Ok(());
  }
  let reference = payment.reference.as_str();
  let fulfilled = match &payment.purpose {
    PaymentPurpose::Order { order_id } => {
      let fulfilled = state.store.fulfil_order(reference, *order_id).await?;
      if fulfilled {
        info!(%reference, %order_id, "Order paid; stock taken and cart cleared.");
      }
      fulfilled
    }
    PaymentPurpose::PlanUpgrade { vendor_id, plan_id } => {
      fulfil_subscription(state, reference, *vendor_id, *plan_id, false).await?
    }
    PaymentPurpose::Renewal { vendor_id, plan_id } => {
      fulfil_subscription(state, reference, *vendor_id, *plan_id, true).await?
    }
  };
  if !fulfilled {
    debug!(%reference, "Payment was fulfilled by another confirmation.");
  }
  Ok(())
}

async fn fulfil_subscription(state: &AppState, reference: &str, vendor_id: Uuid, plan_id: Uuid, extend: bool) -> Result<bool> {
  let Some(vendor) = state.store.vendor(vendor_id).await? else {
    warn!(%vendor_id, %reference, "Paid subscription for a vendor that no longer exists.");
    return Ok(false);
  };
  let vendor = activated(state, vendor, plan_id, extend);
  let fulfilled = state.store.fulfil_subscription(reference, &vendor).await?;
  if fulfilled {
    info!(%vendor_id, %plan_id, expires_at = %vendor.subscription_expires_at, "Subscription activated.");
  }
  Ok(fulfilled)
}

/// Puts the vendor on `plan_id` with an active subscription without a payment.
pub async fn activate_plan(state: &AppState, vendor_id: Uuid, plan_id: Uuid, extend: bool) -> Result<()> {
  let Some(vendor) = state.store.vendor(vendor_id).await? else {
    return Err(AppError::NotFound(format!("Vendor {} not found.", vendor_id)));
  };
  let vendor = activated(state, vendor, plan_id, extend);
  state.store.update_vendor_subscription(&vendor).await?;
  info!(%vendor_id, %plan_id, expires_at = %vendor.subscription_expires_at, "Subscription activated.");
  Ok(())
}

/// A renewal always extends by one cycle; an upgrade keeps the current expiry
/// unless it has lapsed.
fn activated(state: &AppState, mut vendor: VendorProfile, plan_id: Uuid, extend: bool) -> VendorProfile {
  let policy = &state.config.subscription;
  let now = Utc::now();
  vendor.plan_id = plan_id;
  if extend || vendor.subscription_expires_at <= now {
    let (status, expires_at) = policy.renew(vendor.subscription_expires_at, now);
    vendor.subscription_status = status;
    vendor.subscription_expires_at = expires_at;
  } else {
    vendor.subscription_status = SubscriptionStatus::Active;
  }
  vendor
}

/// Records a pending subscription payment and opens it with the gateway. No split:
/// subscription revenue stays with the platform.
pub async fn open_subscription_payment(
  state: &AppState,
  payer_email: &str,
  purpose: PaymentPurpose,
  amount: Kobo,
) -> Result<(String, Authorization)> {
  let prefix = match &purpose {
    PaymentPurpose::Renewal { .. } => "rnw",
    _ => "sub",
  };
  let reference = payment::new_reference(prefix);
  let metadata = json!({ "purpose": &purpose });
  let pending = Payment::pending(reference.clone(), purpose, payer_email.to_string(), amount);
  state.store.insert_payment(&pending).await?;

  let request = InitializeRequest {
    email: payer_email.to_string(),
    amount,
    reference: reference.clone(),
    callback_url: Some(state.config.callback_url(&reference)),
    split: None,
    metadata: Some(metadata),
  };
  let authorization = state.gateway.initialize(&request).await.map_err(|e| {
    warn!(%reference, error = %e, "Gateway refused to open the payment; it stays pending.");
    AppError::from(e)
  })?;
  Ok((reference, authorization))
}
