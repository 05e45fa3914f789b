// apps/marketplace/src/models/plan.rs

use bazaar::subscription::VendorPlan;
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PlanRow {
  pub id: Uuid,
  pub name: String,
  pub price: Decimal,
  pub product_quota: i32,
}

impl From<PlanRow> for VendorPlan {
  fn from(row: PlanRow) -> Self {
    VendorPlan {
      id: row.id,
      name: row.name,
      price: row.price,
      product_quota: row.product_quota,
    }
  }
}
