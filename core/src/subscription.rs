// core/src/subscription.rs

//! Vendor subscription billing.
//!
//! Plans are priced per billing cycle. A mid-cycle move to a dearer plan is charged
//! pro rata for the days left; a move to a cheaper or equal plan is free and takes
//! effect at once. Subscriptions run `trial -> active`, fall into `grace` when they
//! expire, and are `cancelled` once the grace period runs out.

use crate::catalog::VendorProfile;
use crate::money::round_to_currency;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_CYCLE_DAYS: u32 = 30;
pub const DEFAULT_TRIAL_DAYS: u32 = 14;
pub const DEFAULT_GRACE_DAYS: u32 = 7;
/// Upper bound for any configured period, about ten years.
pub const MAX_PERIOD_DAYS: u32 = 3650;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
  #[error("Billing cycle must be at least one day")]
  EmptyCycle,

  #[error("{name} of {days} days exceeds the {MAX_PERIOD_DAYS} day limit")]
  PeriodTooLong { name: &'static str, days: u32 },

  #[error("Plan price {0} is negative")]
  NegativePrice(Decimal),

  #[error("Vendor is already on plan {0}")]
  SamePlan(Uuid),

  #[error("Subscription is {0}; listing new products is not allowed")]
  Inactive(SubscriptionStatus),

  #[error("Plan allows {quota} active products and {active} are listed")]
  QuotaExceeded { quota: i32, active: i64 },

  #[error("Unknown subscription status '{0}'")]
  UnknownStatus(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorPlan {
  pub id: Uuid,
  pub name: String,
  /// Naira per billing cycle.
  pub price: Decimal,
  pub product_quota: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
  Trial,
  Active,
  Grace,
  Cancelled,
}

impl SubscriptionStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      SubscriptionStatus::Trial => "trial",
      SubscriptionStatus::Active => "active",
      SubscriptionStatus::Grace => "grace",
      SubscriptionStatus::Cancelled => "cancelled",
    }
  }

  /// Trial, active and grace vendors keep selling.
  pub fn can_sell(self) -> bool {
    !matches!(self, SubscriptionStatus::Cancelled)
  }
}

impl fmt::Display for SubscriptionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SubscriptionStatus {
  type Err = SubscriptionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "trial" => Ok(SubscriptionStatus::Trial),
      "active" => Ok(SubscriptionStatus::Active),
      "grace" => Ok(SubscriptionStatus::Grace),
      "cancelled" => Ok(SubscriptionStatus::Cancelled),
      other => Err(SubscriptionError::UnknownStatus(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPolicy {
  pub cycle_days: u32,
  pub trial_days: u32,
  pub grace_days: u32,
}

impl Default for SubscriptionPolicy {
  fn default() -> Self {
    Self {
      cycle_days: DEFAULT_CYCLE_DAYS,
      trial_days: DEFAULT_TRIAL_DAYS,
      grace_days: DEFAULT_GRACE_DAYS,
    }
  }
}

impl SubscriptionPolicy {
  pub fn new(cycle_days: u32, trial_days: u32, grace_days: u32) -> Result<Self, SubscriptionError> {
    if cycle_days == 0 {
      return Err(SubscriptionError::EmptyCycle);
    }
    for (name, days) in [("Billing cycle", cycle_days), ("Trial", trial_days), ("Grace period", grace_days)] {
      if days > MAX_PERIOD_DAYS {
        return Err(SubscriptionError::PeriodTooLong { name, days });
      }
    }
    Ok(Self {
      cycle_days,
      trial_days,
      grace_days,
    })
  }

  /// Whole days from `now` until `expires_at`, clamped to `[0, cycle_days]`.
  pub fn days_remaining(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days = (expires_at - now).num_days().max(0);
    u32::try_from(days).unwrap_or(u32::MAX).min(self.cycle_days)
  }

  /// Status a subscription should have at `now`.
  pub fn evaluate(&self, status: SubscriptionStatus, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> SubscriptionStatus {
    match status {
      SubscriptionStatus::Cancelled => SubscriptionStatus::Cancelled,
      _ if now <= expires_at => status,
      _ if now <= expires_at + Duration::days(i64::from(self.grace_days)) => SubscriptionStatus::Grace,
      _ => SubscriptionStatus::Cancelled,
    }
  }

  /// Expiry for a vendor starting a trial at `now`.
  pub fn trial_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(i64::from(self.trial_days))
  }

  /// Status and expiry after a paid renewal: one more cycle from whichever is later,
  /// `now` or the current expiry.
  pub fn renew(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> (SubscriptionStatus, DateTime<Utc>) {
    let from = std::cmp::max(now, expires_at);
    (SubscriptionStatus::Active, from + Duration::days(i64::from(self.cycle_days)))
  }
}

/// `(target - current) / cycle_days * days_remaining`, rounded to kobo precision;
/// zero when the target is not dearer.
pub fn prorate(current: Decimal, target: Decimal, days_remaining: u32, cycle_days: u32) -> Result<Decimal, SubscriptionError> {
  if cycle_days == 0 {
    return Err(SubscriptionError::EmptyCycle);
  }
  for price in [current, target] {
    if price.is_sign_negative() && !price.is_zero() {
      return Err(SubscriptionError::NegativePrice(price));
    }
  }
  if target <= current {
    return Ok(Decimal::ZERO);
  }
  let days = Decimal::from(days_remaining.min(cycle_days));
  // Multiplying before dividing keeps whole-day results exact.
  Ok(round_to_currency((target - current) * days / Decimal::from(cycle_days)))
}

/// How a requested plan change is carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanChange {
  /// Downgrade, sideways move, or an upgrade with nothing left to prorate.
  /// Applied at once.
  Free,
  /// Upgrade with a prorated charge. Unless `immediate`, the plan switches only
  /// when the charge is confirmed.
  Charge { amount: Decimal, immediate: bool },
}

impl PlanChange {
  pub fn applies_now(&self) -> bool {
    match self {
      PlanChange::Free => true,
      PlanChange::Charge { immediate, .. } => *immediate,
    }
  }
}

/// Quotes a change from `current` to `target` for a vendor whose cycle ends at
/// `expires_at`.
pub fn quote_plan_change(
  policy: &SubscriptionPolicy,
  current: &VendorPlan,
  target: &VendorPlan,
  expires_at: DateTime<Utc>,
  now: DateTime<Utc>,
  immediate: bool,
) -> Result<PlanChange, SubscriptionError> {
  if current.id == target.id {
    return Err(SubscriptionError::SamePlan(current.id));
  }
  let days = policy.days_remaining(expires_at, now);
  let amount = prorate(current.price, target.price, days, policy.cycle_days)?;
  if amount.is_zero() {
    return Ok(PlanChange::Free);
  }
  Ok(PlanChange::Charge { amount, immediate })
}

/// Checks that `vendor` may list one more product on `plan`.
pub fn ensure_can_list(
  policy: &SubscriptionPolicy,
  vendor: &VendorProfile,
  plan: &VendorPlan,
  active_products: i64,
  now: DateTime<Utc>,
) -> Result<(), SubscriptionError> {
  let status = policy.evaluate(vendor.subscription_status, vendor.subscription_expires_at, now);
  if !status.can_sell() {
    return Err(SubscriptionError::Inactive(status));
  }
  if active_products >= i64::from(plan.product_quota) {
    return Err(SubscriptionError::QuotaExceeded {
      quota: plan.product_quota,
      active: active_products,
    });
  }
  Ok(())
}
