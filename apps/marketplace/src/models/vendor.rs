// apps/marketplace/src/models/vendor.rs

use bazaar::catalog::VendorProfile;
use bazaar::store::StoreError;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct VendorRow {
  pub id: Uuid,
  pub store_name: String,
  pub email: String,
  pub payout_account: Option<String>,
  pub plan_id: Uuid,
  pub subscription_status: String,
  pub subscription_expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}

impl TryFrom<VendorRow> for VendorProfile {
  type Error = StoreError;

  fn try_from(row: VendorRow) -> Result<Self, Self::Error> {
    let subscription_status = row.subscription_status.parse().map_err(|e| StoreError::Corrupt {
      entity: "vendor",
      detail: format!("{}: {}", row.id, e),
    })?;
    Ok(VendorProfile {
      id: row.id,
      store_name: row.store_name,
      email: row.email,
      payout_account: row.payout_account,
      plan_id: row.plan_id,
      subscription_status,
      subscription_expires_at: row.subscription_expires_at,
      created_at: row.created_at,
    })
  }
}
