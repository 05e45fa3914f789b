// apps/marketplace/src/pipelines/checkout_pipeline.rs

use crate::errors::{AppError, Result};
use crate::pipelines::contexts::CheckoutCtxData;
use bazaar::cart::{checkout_lines, CartError};
use bazaar::gateway::InitializeRequest;
use bazaar::order::Order;
use bazaar::payment::{new_reference, Payment, PaymentPurpose};
use bazaar::store::{CartStore, CatalogStore, OrderStore};
use bazaar::{compute_split, ContextData, Pipeline, StepControl, Workflows};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub fn register_checkout_pipeline(workflows: &Workflows<AppError>) {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    ("load_buyer", false),
    ("build_lines", false),
    ("compute_split", false),
    ("persist_order", false),
    ("initialize_payment", false),
  ]);

  p.on("load_buyer", load_buyer);
  p.on("build_lines", build_lines);
  p.on("compute_split", split_order);
  p.on("persist_order", persist_order);
  p.on("initialize_payment", initialize_payment);

  workflows.register(p);
}

async fn load_buyer(ctx: ContextData<CheckoutCtxData>) -> Result<StepControl> {
  let (state, buyer_id) = {
    let data = ctx.read();
    (data.app_state.clone(), data.buyer_id)
  };

  let Some(buyer) = state.store.buyer(buyer_id).await? else {
    warn!(%buyer_id, "Checkout attempted by an unknown buyer.");
    return Err(AppError::Auth(format!("Unknown buyer {}", buyer_id)));
  };
  ctx.write().buyer = Some(buyer);
  Ok(StepControl::Continue)
}

/// Resolves the cart against current products and their vendors' payout accounts.
async fn build_lines(ctx: ContextData<CheckoutCtxData>) -> Result<StepControl> {
  let (state, buyer_id) = {
    let data = ctx.read();
    (data.app_state.clone(), data.buyer_id)
  };

  let items = state.store.cart_items(buyer_id).await?;
  if items.is_empty() {
    return Err(CartError::Empty.into());
  }

  let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
  let products: HashMap<Uuid, _> = state
    .store
    .products_by_ids(&product_ids)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

  let vendor_ids: Vec<Uuid> = products
    .values()
    .map(|p| p.vendor_id)
    .collect::<HashSet<_>>()
    .into_iter()
    .collect();
  let vendors: HashMap<Uuid, _> = state
    .store
    .vendors_by_ids(&vendor_ids)
    .await?
    .into_iter()
    .map(|v| (v.id, v))
    .collect();

  let lines = checkout_lines(&items, &products, &vendors)?;
  ctx.write().lines = lines;
  Ok(StepControl::Continue)
}

#[instrument(name = "checkout::compute_split", skip_all, err(Display))]
async fn split_order(ctx: ContextData<CheckoutCtxData>) -> Result<StepControl> {
  let plan = {
    let data = ctx.read();
    compute_split(&data.lines, &data.app_state.config.fees)?
  };
  info!(
    subtotal = %plan.subtotal,
    fee = %plan.fee,
    vendors = plan.shares.len(),
    unsplit = %plan.unsplit,
    "Split computed."
  );
  ctx.write().plan = Some(plan);
  Ok(StepControl::Continue)
}

/// Stores the order and its pending payment together.
async fn persist_order(ctx: ContextData<CheckoutCtxData>) -> Result<StepControl> {
  let (state, order, payment) = {
    let data = ctx.read();
    let buyer = data
      .buyer
      .as_ref()
      .ok_or_else(|| AppError::Internal("Buyer not loaded before persisting the order.".to_string()))?;
    let plan = data
      .plan
      .as_ref()
      .ok_or_else(|| AppError::Internal("Split not computed before persisting the order.".to_string()))?;
    let order = Order::from_plan(new_reference("ord"), buyer.id, &data.lines, plan, data.delivery.clone())?;
    let payment = Payment::pending(
      order.reference.clone(),
      PaymentPurpose::Order { order_id: order.id },
      buyer.email.clone(),
      order.total()?,
    );
    (data.app_state.clone(), order, payment)
  };

  state.store.insert_order_with_payment(&order, &payment).await?;
  info!(order_id = %order.id, reference = %order.reference, amount = %payment.amount, "Order created.");
  ctx.write().order = Some(order);
  Ok(StepControl::Continue)
}

/// Opens the charge with the gateway. On failure the payment stays pending and the
/// buyer may retry checkout.
async fn initialize_payment(ctx: ContextData<CheckoutCtxData>) -> Result<StepControl> {
  let (state, request) = {
    let data = ctx.read();
    let (Some(buyer), Some(plan), Some(order)) = (&data.buyer, &data.plan, &data.order) else {
      return Err(AppError::Internal("Checkout context incomplete before payment.".to_string()));
    };
    let request = InitializeRequest {
      email: buyer.email.clone(),
      amount: plan.total()?,
      reference: order.reference.clone(),
      callback_url: Some(data.app_state.config.callback_url(&order.reference)),
      split: plan.to_gateway_split(),
      metadata: Some(json!({ "order_id": order.id })),
    };
    (data.app_state.clone(), request)
  };

  let authorization = state.gateway.initialize(&request).await.map_err(|e| {
    warn!(reference = %request.reference, error = %e, "Payment initialization failed; order left unpaid.");
    AppError::from(e)
  })?;
  ctx.write().authorization = Some(authorization);
  Ok(StepControl::Continue)
}
