// apps/marketplace/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::cart::summarize;
use bazaar::store::{CartStore, CatalogStore};
use bazaar::{ContextData, PipelineOutcome};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::pipelines::contexts::{CartChange, CartCtxData};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct AddToCartPayload {
  pub product_id: Uuid,
  pub quantity: i32,
}

#[derive(Deserialize, Debug)]
pub struct SetQuantityPayload {
  pub quantity: i32,
}

/// Current cart with prices as they stand now.
#[instrument(name = "handler::view_cart", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn view_cart_handler(app_state: web::Data<AppState>, auth_user: AuthenticatedUser) -> Result<HttpResponse> {
  let items = app_state.store.cart_items(auth_user.user_id).await?;
  let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
  let products: HashMap<Uuid, _> = app_state
    .store
    .products_by_ids(&product_ids)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

  let summary = summarize(&items, &products)?;
  info!(lines = summary.lines.len(), subtotal = %summary.subtotal, "Cart viewed.");
  Ok(HttpResponse::Ok().json(summary))
}

async fn run_cart_change(app_state: &AppState, user_id: Uuid, product_id: Uuid, change: CartChange) -> Result<HttpResponse> {
  let ctx = ContextData::new(CartCtxData::new(app_state.clone(), user_id, product_id, change));
  match app_state.workflows.run(ctx.clone()).await? {
    PipelineOutcome::Completed => {}
    PipelineOutcome::Stopped => {
      return Err(AppError::Internal("Cart update stopped before completing.".to_string()));
    }
  }

  let data = ctx.read();
  if data.removed {
    return Ok(HttpResponse::Ok().json(json!({ "removed": true, "product_id": product_id })));
  }
  let item = data
    .updated_item
    .as_ref()
    .ok_or_else(|| AppError::Internal("Cart update completed without an item.".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({ "removed": false, "item": item })))
}

#[instrument(
  name = "handler::add_to_cart",
  skip(app_state, payload, auth_user),
  fields(user_id = %auth_user.user_id, product_id = %payload.product_id, quantity = payload.quantity)
)]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<AddToCartPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse> {
  let payload = payload.into_inner();
  run_cart_change(&app_state, auth_user.user_id, payload.product_id, CartChange::Add(payload.quantity)).await
}

#[instrument(name = "handler::set_cart_quantity", skip(app_state, path, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn set_cart_quantity_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<SetQuantityPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse> {
  run_cart_change(&app_state, auth_user.user_id, path.into_inner(), CartChange::Set(payload.quantity)).await
}

#[instrument(name = "handler::remove_from_cart", skip(app_state, path, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn remove_from_cart_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse> {
  run_cart_change(&app_state, auth_user.user_id, path.into_inner(), CartChange::Remove).await
}
