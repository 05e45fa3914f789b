// apps/marketplace/src/models/order_item.rs

use bazaar::order::OrderLine;
use bazaar::Kobo;
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct OrderItemRow {
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub vendor_id: Uuid,
  pub unit_price: Decimal,
  pub quantity: i32,
  pub line_total_kobo: i64,
}

impl From<OrderItemRow> for OrderLine {
  fn from(row: OrderItemRow) -> Self {
    OrderLine {
      product_id: row.product_id,
      vendor_id: row.vendor_id,
      unit_price: row.unit_price,
      quantity: row.quantity,
      line_total: Kobo(row.line_total_kobo),
    }
  }
}
