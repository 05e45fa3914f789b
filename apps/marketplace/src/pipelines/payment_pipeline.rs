// apps/marketplace/src/pipelines/payment_pipeline.rs

//! Buyer-initiated confirmation: the callback page polls the gateway for the
//! charge and settles the payment with what it reports.

use crate::errors::{AppError, Result};
use crate::pipelines::common_steps::{fulfil, settle_and_apply};
use crate::pipelines::contexts::VerifyPaymentCtxData;
use bazaar::payment::{PaymentError, PaymentStatus, Settlement};
use bazaar::store::PaymentStore;
use bazaar::{ContextData, Pipeline, StepControl, Workflows};
use tracing::{debug, info, warn};

pub fn register_verify_payment_pipeline(workflows: &Workflows<AppError>) {
  let mut p = Pipeline::<VerifyPaymentCtxData, AppError>::new(&[
    ("load_payment", false),
    ("query_gateway", false),
    ("settle", false),
  ]);

  p.on("load_payment", load_payment);
  p.on("query_gateway", query_gateway);
  p.on("settle", settle);

  workflows.register(p);
}

/// Stops early for payments that are already settled; the gateway is not asked
/// again. A paid payment whose effects are still outstanding is fulfilled here.
async fn load_payment(ctx: ContextData<VerifyPaymentCtxData>) -> Result<StepControl> {
  let (state, reference) = {
    let data = ctx.read();
    (data.app_state.clone(), data.reference.clone())
  };

  let mut payment = state
    .store
    .payment(&reference)
    .await?
    .ok_or_else(|| PaymentError::NotFound(reference.clone()))?;

  if payment.awaits_fulfilment() {
    warn!(%reference, "Paid payment was never fulfilled; retrying.");
    fulfil(&state, &payment).await?;
    payment = state
      .store
      .payment(&reference)
      .await?
      .ok_or_else(|| PaymentError::NotFound(reference.clone()))?;
  }

  let settled = match payment.status {
    PaymentStatus::Paid => Some(Settlement::AlreadyPaid),
    PaymentStatus::Failed => Some(Settlement::AlreadyFailed),
    PaymentStatus::Pending => None,
  };

  let mut data = ctx.write();
  data.payment = Some(payment);
  if let Some(settlement) = settled {
    debug!(%reference, ?settlement, "Payment already settled.");
    data.settlement = Some(settlement);
    return Ok(StepControl::Stop);
  }
  Ok(StepControl::Continue)
}

async fn query_gateway(ctx: ContextData<VerifyPaymentCtxData>) -> Result<StepControl> {
  let (state, reference) = {
    let data = ctx.read();
    (data.app_state.clone(), data.reference.clone())
  };

  let report = state.gateway.verify(&reference).await?;
  info!(%reference, status = ?report.status, amount = %report.amount, "Gateway reported charge.");
  ctx.write().report = Some(report);
  Ok(StepControl::Continue)
}

async fn settle(ctx: ContextData<VerifyPaymentCtxData>) -> Result<StepControl> {
  let (state, report) = {
    let data = ctx.read();
    let report = data
      .report
      .clone()
      .ok_or_else(|| AppError::Internal("No gateway report to settle with.".to_string()))?;
    (data.app_state.clone(), report)
  };

  let settlement = settle_and_apply(&state, &report).await?;
  let payment = state.store.payment(&report.reference).await?;

  let mut data = ctx.write();
  data.settlement = Some(settlement);
  if payment.is_some() {
    data.payment = payment;
  }
  Ok(StepControl::Continue)
}
