// apps/marketplace/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use bazaar::store::CatalogStore;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::state::AppState;

#[instrument(name = "handler::list_products", skip(app_state))]
pub async fn list_products_handler(app_state: web::Data<AppState>) -> Result<HttpResponse> {
  let products = app_state.store.active_products().await?;
  info!(count = products.len(), "Listed products.");
  Ok(HttpResponse::Ok().json(json!({ "products": products })))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
  let product_id = path.into_inner();
  let product = app_state
    .store
    .product(product_id)
    .await?
    .filter(|p| p.active)
    .ok_or_else(|| AppError::NotFound(format!("Product {} not found.", product_id)))?;
  Ok(HttpResponse::Ok().json(json!({ "product": product })))
}
