// apps/marketplace/src/pipelines/cart_pipeline.rs

use crate::errors::{AppError, Result};
use crate::pipelines::contexts::{CartChange, CartCtxData};
use bazaar::cart::CartError;
use bazaar::store::{CartStore, CatalogStore};
use bazaar::{ContextData, Pipeline, StepControl, Workflows};
use tracing::{info, instrument, warn};

pub fn register_cart_pipeline(workflows: &Workflows<AppError>) {
  let mut p = Pipeline::<CartCtxData, AppError>::new(&[
    ("validate_change", false),
    ("load_product", false),
    ("apply_change", false),
  ]);

  // Nothing to look up when the item is leaving the cart.
  p.skip_if("load_product", |data: &CartCtxData| data.target_quantity == 0);

  p.on("validate_change", validate_change);
  p.on("load_product", load_product);
  p.on("apply_change", apply_change);

  workflows.register(p);
}

#[instrument(name = "cart::validate_change", skip_all, err(Display))]
async fn validate_change(ctx: ContextData<CartCtxData>) -> Result<StepControl> {
  let (state, user_id, product_id, change) = {
    let data = ctx.read();
    (data.app_state.clone(), data.user_id, data.product_id, data.change)
  };

  let target = match change {
    CartChange::Add(quantity) if quantity <= 0 => {
      return Err(AppError::Validation("Quantity must be a positive number.".to_string()));
    }
    CartChange::Set(quantity) if quantity < 0 => {
      return Err(AppError::Validation("Quantity must not be negative.".to_string()));
    }
    CartChange::Add(quantity) => {
      let items = state.store.cart_items(user_id).await?;
      let existing = items
        .iter()
        .find(|item| item.product_id == product_id)
        .map_or(0, |item| item.quantity);
      existing
        .checked_add(quantity)
        .ok_or_else(|| AppError::Validation("Quantity is too large.".to_string()))?
    }
    CartChange::Set(quantity) => quantity,
    CartChange::Remove => 0,
  };

  ctx.write().target_quantity = target;
  Ok(StepControl::Continue)
}

async fn load_product(ctx: ContextData<CartCtxData>) -> Result<StepControl> {
  let (state, product_id, target) = {
    let data = ctx.read();
    (data.app_state.clone(), data.product_id, data.target_quantity)
  };

  let product = state
    .store
    .product(product_id)
    .await?
    .filter(|p| p.active)
    .ok_or_else(|| AppError::NotFound(format!("Product {} not found.", product_id)))?;

  if !product.has_stock_for(target) {
    warn!(%product_id, requested = target, available = product.stock_quantity, "Not enough stock for cart change.");
    return Err(CartError::InsufficientStock {
      product_id,
      available: product.stock_quantity,
    }
    .into());
  }

  ctx.write().product = Some(product);
  Ok(StepControl::Continue)
}

async fn apply_change(ctx: ContextData<CartCtxData>) -> Result<StepControl> {
  let (state, user_id, product_id, target) = {
    let data = ctx.read();
    (data.app_state.clone(), data.user_id, data.product_id, data.target_quantity)
  };

  if target == 0 {
    if !state.store.remove_cart_item(user_id, product_id).await? {
      return Err(AppError::NotFound(format!("Product {} is not in the cart.", product_id)));
    }
    info!(%user_id, %product_id, "Removed from cart.");
    ctx.write().removed = true;
    return Ok(StepControl::Continue);
  }

  let item = state.store.set_cart_quantity(user_id, product_id, target).await?;
  info!(%user_id, %product_id, quantity = item.quantity, "Cart updated.");
  ctx.write().updated_item = Some(item);
  Ok(StepControl::Continue)
}
