// apps/marketplace/src/models/buyer.rs

use bazaar::catalog::Buyer;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct BuyerRow {
  pub id: Uuid,
  pub email: String,
  pub name: Option<String>,
}

impl From<BuyerRow> for Buyer {
  fn from(row: BuyerRow) -> Self {
    Buyer {
      id: row.id,
      email: row.email,
      name: row.name,
    }
  }
}
