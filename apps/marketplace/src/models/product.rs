// apps/marketplace/src/models/product.rs

use bazaar::catalog::Product;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
  pub id: Uuid,
  pub vendor_id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub unit_price: Decimal,
  pub stock_quantity: i32,
  pub active: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
  fn from(row: ProductRow) -> Self {
    Product {
      id: row.id,
      vendor_id: row.vendor_id,
      name: row.name,
      description: row.description,
      unit_price: row.unit_price,
      stock_quantity: row.stock_quantity,
      active: row.active,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}
