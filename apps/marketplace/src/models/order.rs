// apps/marketplace/src/models/order.rs

use super::OrderItemRow;
use bazaar::order::{Delivery, Order};
use bazaar::Kobo;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
  pub id: Uuid,
  pub reference: String,
  pub buyer_id: Uuid,
  pub subtotal_kobo: i64,
  pub fee_kobo: i64,
  pub delivery: Json<Delivery>,
  pub paid: bool,
  pub created_at: DateTime<Utc>,
}

impl OrderRow {
  pub fn into_order(self, items: Vec<OrderItemRow>) -> Order {
    Order {
      id: self.id,
      reference: self.reference,
      buyer_id: self.buyer_id,
      lines: items.into_iter().map(Into::into).collect(),
      subtotal: Kobo(self.subtotal_kobo),
      fee: Kobo(self.fee_kobo),
      delivery: self.delivery.0,
      paid: self.paid,
      created_at: self.created_at,
    }
  }
}
