// apps/marketplace/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use bazaar::cart::CartError;
use bazaar::gateway::GatewayError;
use bazaar::money::MoneyError;
use bazaar::payment::{PaymentError, SettleError};
use bazaar::signature::SignatureError;
use bazaar::split::SplitError;
use bazaar::store::StoreError;
use bazaar::subscription::SubscriptionError;
use bazaar::WorkflowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  /// Totals or amounts that do not add up. Nothing is charged or changed.
  #[error("Consistency Error: {0}")]
  Consistency(String),

  #[error("Payment Gateway Error: {0}")]
  Gateway(#[from] GatewayError),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Storage Error: {0}")]
  Store(#[from] StoreError),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: WorkflowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(err) => AppError::Internal(err.to_string()),
    }
  }
}

impl From<MoneyError> for AppError {
  fn from(err: MoneyError) -> Self {
    AppError::Validation(err.to_string())
  }
}

impl From<SplitError> for AppError {
  fn from(err: SplitError) -> Self {
    match err {
      SplitError::TotalsMismatch { .. } => AppError::Consistency(err.to_string()),
      other => AppError::Validation(other.to_string()),
    }
  }
}

impl From<CartError> for AppError {
  fn from(err: CartError) -> Self {
    AppError::Validation(err.to_string())
  }
}

impl From<PaymentError> for AppError {
  fn from(err: PaymentError) -> Self {
    match err {
      PaymentError::NotFound(_) => AppError::NotFound(err.to_string()),
      PaymentError::AmountMismatch { .. } | PaymentError::ReferenceMismatch { .. } => {
        AppError::Consistency(err.to_string())
      }
      PaymentError::UnknownStatus(_) => AppError::Internal(err.to_string()),
    }
  }
}

impl From<SettleError> for AppError {
  fn from(err: SettleError) -> Self {
    match err {
      SettleError::Payment(e) => e.into(),
      SettleError::Store(e) => e.into(),
    }
  }
}

impl From<SubscriptionError> for AppError {
  fn from(err: SubscriptionError) -> Self {
    match err {
      SubscriptionError::Inactive(_) | SubscriptionError::QuotaExceeded { .. } => AppError::Consistency(err.to_string()),
      SubscriptionError::UnknownStatus(_) => AppError::Internal(err.to_string()),
      other => AppError::Validation(other.to_string()),
    }
  }
}

impl From<SignatureError> for AppError {
  fn from(err: SignatureError) -> Self {
    AppError::Auth(err.to_string())
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Consistency(_) => StatusCode::CONFLICT,
      AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
      AppError::Store(StoreError::Duplicate { .. }) => StatusCode::CONFLICT,
      AppError::Config(_) | AppError::Store(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    tracing::error!(application_error = %self, "Responding with error");
    let body = match self {
      AppError::Validation(m) | AppError::NotFound(m) | AppError::Consistency(m) => json!({ "error": m }),
      // Signature and identity details stay in the logs.
      AppError::Auth(_) => json!({ "error": "Unauthorized" }),
      AppError::Gateway(_) => json!({ "error": "Payment gateway unavailable" }),
      AppError::Store(StoreError::Duplicate { entity, .. }) => json!({ "error": format!("{} already exists", entity) }),
      AppError::Config(_) | AppError::Store(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        json!({ "error": "An internal error occurred" })
      }
    };
    HttpResponse::build(self.status_code()).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use bazaar::Kobo;

  #[test]
  fn categories_map_to_status_codes() {
    let mismatch: AppError = SplitError::TotalsMismatch {
      allocated: Kobo(99),
      subtotal: Kobo(100),
    }
    .into();
    assert_eq!(mismatch.status_code(), StatusCode::CONFLICT);

    let empty: AppError = SplitError::EmptyOrder.into();
    assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);

    let upstream: AppError = GatewayError::Status {
      status: 503,
      message: "down".into(),
    }
    .into();
    assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);

    let forged: AppError = SignatureError::Mismatch.into();
    assert_eq!(forged.status_code(), StatusCode::UNAUTHORIZED);

    let missing: AppError = PaymentError::NotFound("ref".into()).into();
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
  }
}
