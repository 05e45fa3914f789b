// core/src/split.rs

//! Split calculator.
//!
//! Partitions an order's subtotal into payout shares keyed by each vendor's gateway
//! sub-account, and computes the transaction fee the buyer pays on top.
//!
//! The fee never enters a share. The platform's main account is the gateway's fee
//! bearer, so the buyer is charged `subtotal + fee` while the shares add up to the
//! subtotal alone. Whatever the shares leave over stays with the main account, which
//! is also where items from vendors without a payout account land (`unsplit`).

use crate::gateway::{SplitConfig, SubaccountShare};
use crate::money::{round_to_unit, Kobo, MoneyError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
  #[error("Order has no line items")]
  EmptyOrder,

  #[error("Quantity {quantity} for product {product_id} must be positive")]
  InvalidQuantity { product_id: Uuid, quantity: i32 },

  #[error("Unit price {unit_price} for product {product_id} is negative")]
  NegativePrice { product_id: Uuid, unit_price: Decimal },

  #[error("Split shares total {allocated} but the subtotal is {subtotal}")]
  TotalsMismatch { allocated: Kobo, subtotal: Kobo },

  #[error(transparent)]
  Money(#[from] MoneyError),
}

/// One priced line of an order, with the vendor it pays out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
  pub product_id: Uuid,
  pub vendor_id: Uuid,
  /// Gateway sub-account code. `None` routes the line to the platform bucket.
  pub payout_account: Option<String>,
  pub unit_price: Decimal,
  pub quantity: i32,
}

impl LineItem {
  /// `round(unit_price * quantity * 100)`.
  pub fn price_minor(&self) -> Result<Kobo, SplitError> {
    let line_total = self
      .unit_price
      .checked_mul(Decimal::from(self.quantity))
      .ok_or(MoneyError::Overflow(self.unit_price))?;
    Ok(Kobo::from_naira(line_total)?)
  }
}

/// Buyer-side transaction fee: `min(percent% of subtotal + fixed, cap)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
  /// Percentage of the subtotal, e.g. `1.5` for 1.5%.
  pub percent: Decimal,
  pub fixed: Kobo,
  pub cap: Kobo,
}

impl Default for FeeSchedule {
  fn default() -> Self {
    Self {
      percent: dec!(1.5),
      fixed: Kobo(10_000),
      cap: Kobo(200_000),
    }
  }
}

impl FeeSchedule {
  pub fn fee_for(&self, subtotal: Kobo) -> Result<Kobo, SplitError> {
    let proportional = round_to_unit(Decimal::from(subtotal.value()) * self.percent / dec!(100));
    let proportional = proportional
      .to_i64()
      .map(Kobo)
      .ok_or(MoneyError::Overflow(proportional))?;
    Ok(std::cmp::min(proportional.checked_add(self.fixed)?, self.cap))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorShare {
  pub payout_account: String,
  pub share: Kobo,
}

/// The result of splitting an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
  /// Shares in order of first appearance in the line items.
  pub shares: Vec<VendorShare>,
  /// Lines whose vendor has no payout account; kept by the platform.
  pub unsplit: Kobo,
  pub subtotal: Kobo,
  pub fee: Kobo,
}

impl SplitPlan {
  /// Amount charged to the buyer.
  pub fn total(&self) -> Result<Kobo, MoneyError> {
    self.subtotal.checked_add(self.fee)
  }

  /// Sum of every bucket, which always equals `subtotal` for a plan built by
  /// [`compute_split`].
  pub fn allocated(&self) -> Result<Kobo, MoneyError> {
    Kobo::checked_sum(self.shares.iter().map(|s| s.share).chain([self.unsplit]))
  }

  pub fn share_for(&self, payout_account: &str) -> Option<Kobo> {
    self
      .shares
      .iter()
      .find(|s| s.payout_account == payout_account)
      .map(|s| s.share)
  }

  /// Gateway split payload, or `None` when every line goes to the platform.
  pub fn to_gateway_split(&self) -> Option<SplitConfig> {
    if self.shares.is_empty() {
      return None;
    }
    Some(SplitConfig::flat_with_account_bearer(
      self
        .shares
        .iter()
        .map(|s| SubaccountShare {
          subaccount: s.payout_account.clone(),
          share: s.share.value(),
        })
        .collect(),
    ))
  }
}

/// Splits `items` into payout buckets and prices the transaction fee.
///
/// Fails closed with [`SplitError::TotalsMismatch`] if rounding each line leaves the
/// buckets a kobo off the subtotal computed over the whole order.
pub fn compute_split(items: &[LineItem], fees: &FeeSchedule) -> Result<SplitPlan, SplitError> {
  if items.is_empty() {
    return Err(SplitError::EmptyOrder);
  }

  let mut shares: Vec<VendorShare> = Vec::new();
  let mut unsplit = Kobo::ZERO;
  let mut exact_subtotal = Decimal::ZERO;

  for item in items {
    if item.quantity <= 0 {
      return Err(SplitError::InvalidQuantity {
        product_id: item.product_id,
        quantity: item.quantity,
      });
    }
    if item.unit_price.is_sign_negative() && !item.unit_price.is_zero() {
      return Err(SplitError::NegativePrice {
        product_id: item.product_id,
        unit_price: item.unit_price,
      });
    }

    let price = item.price_minor()?;
    exact_subtotal = item
      .unit_price
      .checked_mul(Decimal::from(item.quantity))
      .and_then(|line| exact_subtotal.checked_add(line))
      .ok_or(MoneyError::Overflow(exact_subtotal))?;

    match item.payout_account.as_deref() {
      Some(account) => match shares.iter_mut().find(|s| s.payout_account == account) {
        Some(bucket) => bucket.share = bucket.share.checked_add(price)?,
        None => shares.push(VendorShare {
          payout_account: account.to_string(),
          share: price,
        }),
      },
      None => unsplit = unsplit.checked_add(price)?,
    }
  }

  let subtotal = Kobo::from_naira(exact_subtotal)?;
  let allocated = Kobo::checked_sum(shares.iter().map(|s| s.share).chain([unsplit]))?;
  if allocated != subtotal {
    tracing::warn!(%allocated, %subtotal, "Split buckets drifted from the order subtotal.");
    return Err(SplitError::TotalsMismatch { allocated, subtotal });
  }

  let fee = fees.fee_for(subtotal)?;
  // The buyer is charged subtotal + fee; refuse plans whose charge cannot be stored.
  subtotal.checked_add(fee)?;
  Ok(SplitPlan {
    shares,
    unsplit,
    subtotal,
    fee,
  })
}
