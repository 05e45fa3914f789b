// core/src/payment.rs

//! Payment lifecycle.
//!
//! A payment is created `pending` and moves once, to `paid` or `failed`. Both are
//! terminal. Confirmation may arrive from the webhook, from a verify poll, or from
//! both at once, so [`settle`] is idempotent: it decides the transition from the
//! gateway's report, then asks the store to apply it only while the row is still
//! `pending`. Whoever loses that race reads the row back and reports the state the
//! winner left.

use crate::gateway::{ChargeReport, ChargeStatus};
use crate::money::Kobo;
use crate::store::{PaymentStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Failed,
}

impl PaymentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Paid => "paid",
      PaymentStatus::Failed => "failed",
    }
  }

  pub fn is_terminal(self) -> bool {
    !matches!(self, PaymentStatus::Pending)
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentStatus {
  type Err = PaymentError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(PaymentStatus::Pending),
      "paid" => Ok(PaymentStatus::Paid),
      "failed" => Ok(PaymentStatus::Failed),
      other => Err(PaymentError::UnknownStatus(other.to_string())),
    }
  }
}

/// What a payment pays for. Decides what happens once it is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentPurpose {
  Order { order_id: Uuid },
  PlanUpgrade { vendor_id: Uuid, plan_id: Uuid },
  Renewal { vendor_id: Uuid, plan_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
  pub reference: String,
  pub purpose: PaymentPurpose,
  pub payer_email: String,
  pub amount: Kobo,
  pub status: PaymentStatus,
  pub gateway_response: Option<JsonValue>,
  /// Set once the effects of a `paid` payment have been applied.
  pub fulfilled_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Payment {
  pub fn pending(reference: String, purpose: PaymentPurpose, payer_email: String, amount: Kobo) -> Self {
    let now = Utc::now();
    Self {
      reference,
      purpose,
      payer_email,
      amount,
      status: PaymentStatus::Pending,
      gateway_response: None,
      fulfilled_at: None,
      created_at: now,
      updated_at: now,
    }
  }

  /// Paid, but what it paid for has not been applied yet. Stays true until a
  /// fulfilment succeeds, so every later confirmation retries it.
  pub fn awaits_fulfilment(&self) -> bool {
    self.status == PaymentStatus::Paid && self.fulfilled_at.is_none()
  }
}

/// New unique payment reference, e.g. `ord_6f1c…`.
pub fn new_reference(prefix: &str) -> String {
  format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
  #[error("Payment {0} not found")]
  NotFound(String),

  #[error("Gateway reports {reported} for payment {reference}, expected {expected}")]
  AmountMismatch {
    reference: String,
    expected: Kobo,
    reported: Kobo,
  },

  #[error("Gateway report for {reported} was applied to payment {reference}")]
  ReferenceMismatch { reference: String, reported: String },

  #[error("Unknown payment status '{0}'")]
  UnknownStatus(String),
}

/// What [`decide`] wants done with a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  Transition(PaymentStatus),
  Keep(Settlement),
}

/// Outcome of a confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
  /// This call moved the payment out of `pending`.
  Applied(PaymentStatus),
  /// Already `paid`; a repeated confirmation reports success and changes nothing.
  AlreadyPaid,
  /// Already `failed`; late reports are ignored.
  AlreadyFailed,
  /// The gateway has not settled the charge yet.
  StillPending,
}

impl Settlement {
  /// Whether the payment is paid after this call, whichever caller made it so.
  pub fn is_paid(self) -> bool {
    matches!(self, Settlement::Applied(PaymentStatus::Paid) | Settlement::AlreadyPaid)
  }
}

/// Pure transition rule for a payment given a gateway report.
pub fn decide(payment: &Payment, report: &ChargeReport) -> Result<Decision, PaymentError> {
  if report.reference != payment.reference {
    return Err(PaymentError::ReferenceMismatch {
      reference: payment.reference.clone(),
      reported: report.reference.clone(),
    });
  }

  match payment.status {
    PaymentStatus::Paid => Ok(Decision::Keep(Settlement::AlreadyPaid)),
    PaymentStatus::Failed => Ok(Decision::Keep(Settlement::AlreadyFailed)),
    PaymentStatus::Pending => match report.status {
      ChargeStatus::Success if report.amount != payment.amount => Err(PaymentError::AmountMismatch {
        reference: payment.reference.clone(),
        expected: payment.amount,
        reported: report.amount,
      }),
      ChargeStatus::Success => Ok(Decision::Transition(PaymentStatus::Paid)),
      ChargeStatus::Failed | ChargeStatus::Reversed => Ok(Decision::Transition(PaymentStatus::Failed)),
      ChargeStatus::Abandoned | ChargeStatus::Pending => Ok(Decision::Keep(Settlement::StillPending)),
    },
  }
}

#[derive(Debug, Error)]
pub enum SettleError {
  #[error(transparent)]
  Payment(#[from] PaymentError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Applies a gateway report to the stored payment.
///
/// Returns the settlement and the payment as it stands afterwards.
#[instrument(name = "payment::settle", skip(store, report), fields(reference = %report.reference, reported = ?report.status))]
pub async fn settle<S>(store: &S, report: &ChargeReport) -> Result<(Settlement, Payment), SettleError>
where
  S: PaymentStore + ?Sized,
{
  let payment = store
    .payment(&report.reference)
    .await?
    .ok_or_else(|| PaymentError::NotFound(report.reference.clone()))?;

  match decide(&payment, report)? {
    Decision::Keep(settlement) => {
      if settlement == Settlement::AlreadyFailed && report.status == ChargeStatus::Success {
        warn!("Success reported for a payment already marked failed; ignoring.");
      }
      info!(?settlement, "Payment left unchanged.");
      Ok((settlement, payment))
    }
    Decision::Transition(target) => {
      let won = store
        .transition_payment(&payment.reference, target, Some(report.raw.clone()))
        .await?;
      let current = store
        .payment(&payment.reference)
        .await?
        .ok_or_else(|| PaymentError::NotFound(payment.reference.clone()))?;

      if won {
        info!(status = %target, "Payment settled.");
        return Ok((Settlement::Applied(target), current));
      }

      // Another confirmation got there first.
      let settlement = match current.status {
        PaymentStatus::Paid => Settlement::AlreadyPaid,
        PaymentStatus::Failed => Settlement::AlreadyFailed,
        PaymentStatus::Pending => Settlement::StillPending,
      };
      info!(?settlement, "Lost the settlement race; reporting the stored state.");
      Ok((settlement, current))
    }
  }
}
