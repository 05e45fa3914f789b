// core/src/order.rs

use crate::money::{Kobo, MoneyError};
use crate::split::{LineItem, SplitError, SplitPlan};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Delivery {
  #[default]
  Pickup,
  Delivery { address: String, phone: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
  pub product_id: Uuid,
  pub vendor_id: Uuid,
  pub unit_price: Decimal,
  pub quantity: i32,
  pub line_total: Kobo,
}

/// Checkout snapshot. Prices are copied in so later catalog edits do not change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub reference: String,
  pub buyer_id: Uuid,
  pub lines: Vec<OrderLine>,
  pub subtotal: Kobo,
  pub fee: Kobo,
  pub delivery: Delivery,
  pub paid: bool,
  pub created_at: DateTime<Utc>,
}

impl Order {
  pub fn from_plan(
    reference: String,
    buyer_id: Uuid,
    items: &[LineItem],
    plan: &SplitPlan,
    delivery: Delivery,
  ) -> Result<Self, SplitError> {
    let lines = items
      .iter()
      .map(|item| {
        Ok(OrderLine {
          product_id: item.product_id,
          vendor_id: item.vendor_id,
          unit_price: item.unit_price,
          quantity: item.quantity,
          line_total: item.price_minor()?,
        })
      })
      .collect::<Result<Vec<_>, SplitError>>()?;

    Ok(Self {
      id: Uuid::new_v4(),
      reference,
      buyer_id,
      lines,
      subtotal: plan.subtotal,
      fee: plan.fee,
      delivery,
      paid: false,
      created_at: Utc::now(),
    })
  }

  pub fn total(&self) -> Result<Kobo, MoneyError> {
    self.subtotal.checked_add(self.fee)
  }
}
