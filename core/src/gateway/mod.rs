// core/src/gateway/mod.rs

//! The payment gateway port.
//!
//! The marketplace only needs two calls from its gateway: initialize a transaction
//! (optionally with a split) and verify one by reference. Webhook events carry the
//! same transaction shape as a verification, so both are reduced to a
//! [`ChargeReport`].

pub mod paystack;

use crate::money::Kobo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub use paystack::{PaystackClient, PaystackConfig};

/// Every variant means the upstream could not be relied on for this request.
/// None of them are retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
  #[error("Gateway unreachable: {0}")]
  Transport(String),

  #[error("Gateway answered HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("Gateway declined the request: {0}")]
  Rejected(String),

  #[error("Malformed gateway response: {0}")]
  Malformed(String),
}

/// Split payload: flat kobo shares per sub-account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
  #[serde(rename = "type")]
  pub split_type: String,
  pub bearer_type: String,
  pub subaccounts: Vec<SubaccountShare>,
}

impl SplitConfig {
  /// Flat shares with the platform's main account bearing the gateway fee.
  pub fn flat_with_account_bearer(subaccounts: Vec<SubaccountShare>) -> Self {
    Self {
      split_type: "flat".to_string(),
      bearer_type: "account".to_string(),
      subaccounts,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubaccountShare {
  pub subaccount: String,
  pub share: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitializeRequest {
  pub email: String,
  pub amount: Kobo,
  pub reference: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub callback_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub split: Option<SplitConfig>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
  pub authorization_url: String,
  pub access_code: String,
  pub reference: String,
}

/// Transaction status as the gateway reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
  Success,
  Failed,
  Reversed,
  Abandoned,
  /// `ongoing`, `pending`, `processing`, `queued` and anything newer.
  #[serde(other)]
  Pending,
}

impl ChargeStatus {
  /// Whether the gateway considers the charge settled one way or the other.
  pub fn is_final(self) -> bool {
    matches!(self, ChargeStatus::Success | ChargeStatus::Failed | ChargeStatus::Reversed)
  }
}

/// A transaction as seen by the gateway, from a verify call or a webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeReport {
  pub reference: String,
  pub status: ChargeStatus,
  pub amount: Kobo,
  /// The gateway's transaction object, kept verbatim on the payment record.
  pub raw: JsonValue,
}

impl ChargeReport {
  /// Reads `reference`, `status` and `amount` out of a gateway transaction object.
  pub fn from_transaction(raw: JsonValue) -> Result<Self, GatewayError> {
    #[derive(Deserialize)]
    struct Fields {
      reference: String,
      status: ChargeStatus,
      amount: i64,
    }

    let fields: Fields = serde_json::from_value(raw.clone())
      .map_err(|e| GatewayError::Malformed(format!("transaction object: {}", e)))?;
    Ok(Self {
      reference: fields.reference,
      status: fields.status,
      amount: Kobo(fields.amount),
      raw,
    })
  }
}

/// A parsed webhook body: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEvent {
  pub event: String,
  #[serde(default)]
  pub data: JsonValue,
}

impl WebhookEvent {
  pub const CHARGE_SUCCESS: &'static str = "charge.success";
  pub const CHARGE_FAILED: &'static str = "charge.failed";

  pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::Malformed(format!("webhook body: {}", e)))
  }

  /// Whether this event settles a charge. Others are acknowledged and ignored.
  pub fn is_charge_event(&self) -> bool {
    self.event == Self::CHARGE_SUCCESS || self.event == Self::CHARGE_FAILED
  }

  pub fn charge_report(&self) -> Result<ChargeReport, GatewayError> {
    let mut report = ChargeReport::from_transaction(self.data.clone())?;
    // The event name is authoritative when the embedded status lags behind it.
    if self.event == Self::CHARGE_FAILED && report.status == ChargeStatus::Pending {
      report.status = ChargeStatus::Failed;
    }
    Ok(report)
  }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn initialize(&self, request: &InitializeRequest) -> Result<Authorization, GatewayError>;

  async fn verify(&self, reference: &str) -> Result<ChargeReport, GatewayError>;
}
