// core/src/catalog.rs

//! Catalog records: products, the vendors selling them, and buyers.

use crate::subscription::SubscriptionStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
  pub id: Uuid,
  pub vendor_id: Uuid,
  pub name: String,
  pub description: Option<String>,
  /// Naira, two decimal places.
  pub unit_price: Decimal,
  pub stock_quantity: i32,
  pub active: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Product {
  pub fn has_stock_for(&self, quantity: i32) -> bool {
    self.active && quantity <= self.stock_quantity
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorProfile {
  pub id: Uuid,
  pub store_name: String,
  pub email: String,
  /// Gateway sub-account code payouts are routed to.
  pub payout_account: Option<String>,
  pub plan_id: Uuid,
  pub subscription_status: SubscriptionStatus,
  pub subscription_expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
  pub id: Uuid,
  pub email: String,
  pub name: Option<String>,
}
