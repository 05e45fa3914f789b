// apps/marketplace/src/models/payment.rs

use bazaar::payment::{Payment, PaymentPurpose};
use bazaar::store::StoreError;
use bazaar::Kobo;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
  pub reference: String,
  pub purpose: Json<PaymentPurpose>,
  pub payer_email: String,
  pub amount_kobo: i64,
  pub status: String,
  pub gateway_response: Option<JsonValue>,
  pub fulfilled_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
  type Error = StoreError;

  fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
    let status = row.status.parse().map_err(|e| StoreError::Corrupt {
      entity: "payment",
      detail: format!("{}: {}", row.reference, e),
    })?;
    Ok(Payment {
      reference: row.reference,
      purpose: row.purpose.0,
      payer_email: row.payer_email,
      amount: Kobo(row.amount_kobo),
      status,
      gateway_response: row.gateway_response,
      fulfilled_at: row.fulfilled_at,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}
