// tests/common/mod.rs
#![allow(dead_code)]

use bazaar::gateway::{ChargeReport, ChargeStatus};
use bazaar::payment::{Payment, PaymentPurpose};
use bazaar::{ContextData, Kobo, LineItem, StepControl, WorkflowError};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use tracing::Level;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub steps_executed: Vec<String>,
  pub stop_at: Option<String>,
  pub skip_audit: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Workflow error: {0}")]
  Workflow(String),

  #[error("Test handler failed: {0}")]
  Handler(String),
}

impl From<WorkflowError> for TestError {
  fn from(e: WorkflowError) -> Self {
    TestError::Workflow(format!("{:?}", e))
  }
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<StepControl, TestError>> + Send>>;

pub fn recording_handler(label: &'static str) -> bazaar::workflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| -> HandlerFuture {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.steps_executed.push(label.to_string());
      if guard.stop_at.as_deref() == Some(label) {
        return Ok(StepControl::Stop);
      }
      Ok(StepControl::Continue)
    })
  })
}

pub fn failing_handler(label: &'static str, message: &'static str) -> bazaar::workflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| -> HandlerFuture {
    Box::pin(async move {
      ctx.write().steps_executed.push(label.to_string());
      Err(TestError::Handler(message.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub fn naira(s: &str) -> Decimal {
  Decimal::from_str(s).unwrap()
}

pub fn line(account: Option<&str>, price: &str, quantity: i32) -> LineItem {
  LineItem {
    product_id: Uuid::new_v4(),
    vendor_id: Uuid::new_v4(),
    payout_account: account.map(str::to_string),
    unit_price: naira(price),
    quantity,
  }
}

pub fn order_payment(reference: &str, amount: i64) -> Payment {
  Payment::pending(
    reference.to_string(),
    PaymentPurpose::Order { order_id: Uuid::new_v4() },
    "buyer@example.com".to_string(),
    Kobo(amount),
  )
}

pub fn report(reference: &str, status: ChargeStatus, amount: i64) -> ChargeReport {
  ChargeReport {
    reference: reference.to_string(),
    status,
    amount: Kobo(amount),
    raw: json!({ "reference": reference, "amount": amount, "gateway_response": "Approved" }),
  }
}
