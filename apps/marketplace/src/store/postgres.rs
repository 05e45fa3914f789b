// apps/marketplace/src/store/postgres.rs

use crate::models::{BuyerRow, CartItemRow, OrderItemRow, OrderRow, PaymentRow, PlanRow, ProductRow, VendorRow};
use async_trait::async_trait;
use bazaar::cart::CartItem;
use bazaar::catalog::{Buyer, Product, VendorProfile};
use bazaar::order::Order;
use bazaar::payment::{Payment, PaymentStatus};
use bazaar::store::{CartStore, CatalogStore, OrderStore, PaymentStore, StoreError, StoreResult};
use bazaar::subscription::VendorPlan;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

const PRODUCT_COLUMNS: &str =
  "id, vendor_id, name, description, unit_price, stock_quantity, active, created_at, updated_at";
const VENDOR_COLUMNS: &str =
  "id, store_name, email, payout_account, plan_id, subscription_status, subscription_expires_at, created_at";
const PAYMENT_COLUMNS: &str =
  "reference, purpose, payer_email, amount_kobo, status, gateway_response, fulfilled_at, created_at, updated_at";

/// Maps a driver error, keeping unique-key violations distinguishable.
fn store_err(entity: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
  move |err| match &err {
    sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate {
      entity,
      key: db.constraint().unwrap_or("unique key").to_string(),
    },
    _ => StoreError::Backend(anyhow::Error::new(err)),
  }
}

/// Postgres implementation of the `bazaar` storage ports.
#[derive(Clone, Debug)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }
}

#[async_trait]
impl CatalogStore for PgStore {
  async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    let row: Option<ProductRow> = sqlx::query_as(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_err("product"))?;
    Ok(row.map(Into::into))
  }

  async fn active_products(&self) -> StoreResult<Vec<Product>> {
    let rows: Vec<ProductRow> = sqlx::query_as(&format!(
      "SELECT {} FROM products WHERE active ORDER BY created_at DESC",
      PRODUCT_COLUMNS
    ))
    .fetch_all(&self.pool)
    .await
    .map_err(store_err("product"))?;
    Ok(rows.into_iter().map(Into::into).collect())
  }

  async fn products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
    let rows: Vec<ProductRow> = sqlx::query_as(&format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS))
      .bind(ids)
      .fetch_all(&self.pool)
      .await
      .map_err(store_err("product"))?;
    Ok(rows.into_iter().map(Into::into).collect())
  }

  #[instrument(name = "pg::insert_product", skip(self, product), fields(product_id = %product.id), err(Display))]
  async fn insert_product(&self, product: &Product) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO products (id, vendor_id, name, description, unit_price, stock_quantity, active, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(product.id)
    .bind(product.vendor_id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.unit_price)
    .bind(product.stock_quantity)
    .bind(product.active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&self.pool)
    .await
    .map_err(store_err("product"))?;
    Ok(())
  }

  async fn active_product_count(&self, vendor_id: Uuid) -> StoreResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE vendor_id = $1 AND active")
      .bind(vendor_id)
      .fetch_one(&self.pool)
      .await
      .map_err(store_err("product"))
  }

  async fn vendor(&self, id: Uuid) -> StoreResult<Option<VendorProfile>> {
    let row: Option<VendorRow> = sqlx::query_as(&format!("SELECT {} FROM vendors WHERE id = $1", VENDOR_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_err("vendor"))?;
    row.map(TryInto::try_into).transpose()
  }

  async fn vendors_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<VendorProfile>> {
    let rows: Vec<VendorRow> = sqlx::query_as(&format!("SELECT {} FROM vendors WHERE id = ANY($1)", VENDOR_COLUMNS))
      .bind(ids)
      .fetch_all(&self.pool)
      .await
      .map_err(store_err("vendor"))?;
    rows.into_iter().map(TryInto::try_into).collect()
  }

  #[instrument(name = "pg::insert_vendor", skip(self, vendor), fields(vendor_id = %vendor.id), err(Display))]
  async fn insert_vendor(&self, vendor: &VendorProfile) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO vendors (id, store_name, email, payout_account, plan_id, subscription_status, subscription_expires_at, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(vendor.id)
    .bind(&vendor.store_name)
    .bind(&vendor.email)
    .bind(&vendor.payout_account)
    .bind(vendor.plan_id)
    .bind(vendor.subscription_status.as_str())
    .bind(vendor.subscription_expires_at)
    .bind(vendor.created_at)
    .execute(&self.pool)
    .await
    .map_err(store_err("vendor"))?;
    Ok(())
  }

  async fn update_vendor_subscription(&self, vendor: &VendorProfile) -> StoreResult<()> {
    update_vendor_subscription_row(&self.pool, vendor).await
  }

  async fn plan(&self, id: Uuid) -> StoreResult<Option<VendorPlan>> {
    let row: Option<PlanRow> = sqlx::query_as("SELECT id, name, price, product_quota FROM vendor_plans WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_err("plan"))?;
    Ok(row.map(Into::into))
  }

  async fn buyer(&self, id: Uuid) -> StoreResult<Option<Buyer>> {
    let row: Option<BuyerRow> = sqlx::query_as("SELECT id, email, name FROM buyers WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_err("buyer"))?;
    Ok(row.map(Into::into))
  }
}

#[async_trait]
impl CartStore for PgStore {
  async fn cart_items(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
    let rows: Vec<CartItemRow> = sqlx::query_as(
      "SELECT id, user_id, product_id, quantity, added_at FROM cart_items WHERE user_id = $1 ORDER BY added_at, id",
    )
    .bind(user_id)
    .fetch_all(&self.pool)
    .await
    .map_err(store_err("cart item"))?;
    Ok(rows.into_iter().map(Into::into).collect())
  }

  async fn set_cart_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> StoreResult<CartItem> {
    let row: CartItemRow = sqlx::query_as(
      "INSERT INTO cart_items (id, user_id, product_id, quantity, added_at) VALUES ($1, $2, $3, $4, $5) \
       ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity \
       RETURNING id, user_id, product_id, quantity, added_at",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .fetch_one(&self.pool)
    .await
    .map_err(store_err("cart item"))?;
    Ok(row.into())
  }

  async fn remove_cart_item(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
      .bind(user_id)
      .bind(product_id)
      .execute(&self.pool)
      .await
      .map_err(store_err("cart item"))?;
    Ok(result.rows_affected() > 0)
  }
}

#[async_trait]
impl OrderStore for PgStore {
  #[instrument(name = "pg::insert_order_with_payment", skip_all, fields(reference = %order.reference), err(Display))]
  async fn insert_order_with_payment(&self, order: &Order, payment: &Payment) -> StoreResult<()> {
    let mut tx = self.pool.begin().await.map_err(store_err("order"))?;

    sqlx::query(
      "INSERT INTO orders (id, reference, buyer_id, subtotal_kobo, fee_kobo, delivery, paid, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(order.id)
    .bind(&order.reference)
    .bind(order.buyer_id)
    .bind(order.subtotal.value())
    .bind(order.fee.value())
    .bind(Json(&order.delivery))
    .bind(order.paid)
    .bind(order.created_at)
    .execute(&mut *tx)
    .await
    .map_err(store_err("order"))?;

    for line in &order.lines {
      sqlx::query(
        "INSERT INTO order_items (order_id, product_id, vendor_id, unit_price, quantity, line_total_kobo) \
         VALUES ($1, $2, $3, $4, $5, $6)",
      )
      .bind(order.id)
      .bind(line.product_id)
      .bind(line.vendor_id)
      .bind(line.unit_price)
      .bind(line.quantity)
      .bind(line.line_total.value())
      .execute(&mut *tx)
      .await
      .map_err(store_err("order item"))?;
    }

    insert_payment_row(&mut *tx, payment).await?;

    tx.commit().await.map_err(store_err("order"))?;
    debug!(lines = order.lines.len(), "Order and payment stored.");
    Ok(())
  }

  async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(
      "SELECT id, reference, buyer_id, subtotal_kobo, fee_kobo, delivery, paid, created_at FROM orders WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await
    .map_err(store_err("order"))?;
    let Some(row) = row else {
      return Ok(None);
    };

    let items: Vec<OrderItemRow> = sqlx::query_as(
      "SELECT order_id, product_id, vendor_id, unit_price, quantity, line_total_kobo \
       FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(&self.pool)
    .await
    .map_err(store_err("order item"))?;
    Ok(Some(row.into_order(items)))
  }

  #[instrument(name = "pg::fulfil_order", skip(self), err(Display))]
  async fn fulfil_order(&self, reference: &str, order_id: Uuid) -> StoreResult<bool> {
    let mut tx = self.pool.begin().await.map_err(store_err("order"))?;
    if !claim_fulfilment(&mut tx, reference).await? {
      tx.rollback().await.map_err(store_err("payment"))?;
      return Ok(false);
    }

    let buyer: Option<(Uuid,)> = sqlx::query_as("UPDATE orders SET paid = TRUE WHERE id = $1 AND NOT paid RETURNING buyer_id")
      .bind(order_id)
      .fetch_optional(&mut *tx)
      .await
      .map_err(store_err("order"))?;

    if let Some((buyer_id,)) = buyer {
      sqlx::query(
        "UPDATE products p SET stock_quantity = GREATEST(p.stock_quantity - oi.quantity, 0), updated_at = NOW() \
         FROM order_items oi WHERE oi.order_id = $1 AND p.id = oi.product_id",
      )
      .bind(order_id)
      .execute(&mut *tx)
      .await
      .map_err(store_err("product"))?;

      sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(buyer_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err("cart item"))?;
    }

    tx.commit().await.map_err(store_err("order"))?;
    Ok(true)
  }
}

/// Stamps a paid, unfulfilled payment fulfilled inside `tx`. The row lock it
/// takes serializes concurrent fulfilments of the same payment.
async fn claim_fulfilment(tx: &mut Transaction<'_, Postgres>, reference: &str) -> StoreResult<bool> {
  let claimed = sqlx::query(
    "UPDATE payments SET fulfilled_at = NOW(), updated_at = NOW() \
     WHERE reference = $1 AND status = 'paid' AND fulfilled_at IS NULL",
  )
  .bind(reference)
  .execute(&mut **tx)
  .await
  .map_err(store_err("payment"))?;
  Ok(claimed.rows_affected() == 1)
}

async fn update_vendor_subscription_row<'e, E>(executor: E, vendor: &VendorProfile) -> StoreResult<()>
where
  E: sqlx::PgExecutor<'e>,
{
  sqlx::query("UPDATE vendors SET plan_id = $2, subscription_status = $3, subscription_expires_at = $4 WHERE id = $1")
    .bind(vendor.id)
    .bind(vendor.plan_id)
    .bind(vendor.subscription_status.as_str())
    .bind(vendor.subscription_expires_at)
    .execute(executor)
    .await
    .map_err(store_err("vendor"))?;
  Ok(())
}

async fn insert_payment_row<'e, E>(executor: E, payment: &Payment) -> StoreResult<()>
where
  E: sqlx::PgExecutor<'e>,
{
  sqlx::query(
    "INSERT INTO payments (reference, purpose, payer_email, amount_kobo, status, gateway_response, fulfilled_at, created_at, updated_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
  )
  .bind(&payment.reference)
  .bind(Json(&payment.purpose))
  .bind(&payment.payer_email)
  .bind(payment.amount.value())
  .bind(payment.status.as_str())
  .bind(&payment.gateway_response)
  .bind(payment.fulfilled_at)
  .bind(payment.created_at)
  .bind(payment.updated_at)
  .execute(executor)
  .await
  .map_err(store_err("payment"))?;
  Ok(())
}

#[async_trait]
impl PaymentStore for PgStore {
  async fn insert_payment(&self, payment: &Payment) -> StoreResult<()> {
    insert_payment_row(&self.pool, payment).await
  }

  async fn payment(&self, reference: &str) -> StoreResult<Option<Payment>> {
    let row: Option<PaymentRow> = sqlx::query_as(&format!("SELECT {} FROM payments WHERE reference = $1", PAYMENT_COLUMNS))
      .bind(reference)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_err("payment"))?;
    row.map(TryInto::try_into).transpose()
  }

  #[instrument(name = "pg::transition_payment", skip(self, gateway_response), fields(to = %to), err(Display))]
  async fn transition_payment(&self, reference: &str, to: PaymentStatus, gateway_response: Option<JsonValue>) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE payments SET status = $2, gateway_response = $3, updated_at = NOW() \
       WHERE reference = $1 AND status = 'pending'",
    )
    .bind(reference)
    .bind(to.as_str())
    .bind(gateway_response)
    .execute(&self.pool)
    .await
    .map_err(store_err("payment"))?;
    Ok(result.rows_affected() == 1)
  }

  #[instrument(name = "pg::fulfil_subscription", skip(self, vendor), fields(vendor_id = %vendor.id), err(Display))]
  async fn fulfil_subscription(&self, reference: &str, vendor: &VendorProfile) -> StoreResult<bool> {
    let mut tx = self.pool.begin().await.map_err(store_err("payment"))?;
    if !claim_fulfilment(&mut tx, reference).await? {
      tx.rollback().await.map_err(store_err("payment"))?;
      return Ok(false);
    }
    update_vendor_subscription_row(&mut *tx, vendor).await?;
    tx.commit().await.map_err(store_err("vendor"))?;
    Ok(true)
  }
}
