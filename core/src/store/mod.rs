// core/src/store/mod.rs

//! Storage ports.
//!
//! The service talks to persistence only through these traits; `memory` implements
//! them in process and the marketplace app implements them on Postgres.

pub mod memory;

use crate::cart::CartItem;
use crate::catalog::{Buyer, Product, VendorProfile};
use crate::order::Order;
use crate::payment::{Payment, PaymentStatus};
use crate::subscription::VendorPlan;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Duplicate {entity}: {key}")]
  Duplicate { entity: &'static str, key: String },

  #[error("Stored {entity} is corrupt: {detail}")]
  Corrupt { entity: &'static str, detail: String },

  #[error("Storage backend failed: {0}")]
  Backend(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
  async fn product(&self, id: Uuid) -> StoreResult<Option<Product>>;

  /// Active products, newest first.
  async fn active_products(&self) -> StoreResult<Vec<Product>>;

  async fn products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;

  async fn insert_product(&self, product: &Product) -> StoreResult<()>;

  async fn active_product_count(&self, vendor_id: Uuid) -> StoreResult<i64>;

  async fn vendor(&self, id: Uuid) -> StoreResult<Option<VendorProfile>>;

  async fn vendors_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<VendorProfile>>;

  async fn insert_vendor(&self, vendor: &VendorProfile) -> StoreResult<()>;

  /// Overwrites plan, subscription status and expiry.
  async fn update_vendor_subscription(&self, vendor: &VendorProfile) -> StoreResult<()>;

  async fn plan(&self, id: Uuid) -> StoreResult<Option<VendorPlan>>;

  async fn buyer(&self, id: Uuid) -> StoreResult<Option<Buyer>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
  async fn cart_items(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>>;

  /// Sets the quantity of `product_id` in the cart, creating the item if needed.
  async fn set_cart_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> StoreResult<CartItem>;

  /// Returns whether an item was removed.
  async fn remove_cart_item(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Persists an order together with the pending payment that pays for it.
  async fn insert_order_with_payment(&self, order: &Order, payment: &Payment) -> StoreResult<()>;

  async fn order(&self, id: Uuid) -> StoreResult<Option<Order>>;

  /// Fulfils the paid payment `reference` for order `order_id` as one atomic
  /// change: marks the order paid, takes its quantities out of stock, clears the
  /// buyer's cart and stamps the payment fulfilled.
  ///
  /// Returns false, changing nothing, unless the payment is `paid` and not yet
  /// fulfilled.
  async fn fulfil_order(&self, reference: &str, order_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
  async fn insert_payment(&self, payment: &Payment) -> StoreResult<()>;

  async fn payment(&self, reference: &str) -> StoreResult<Option<Payment>>;

  /// Moves a payment from `pending` to `to`, storing the gateway response.
  /// Returns false, changing nothing, if the payment was no longer pending.
  async fn transition_payment(&self, reference: &str, to: PaymentStatus, gateway_response: Option<JsonValue>) -> StoreResult<bool>;

  /// Writes `vendor`'s plan, status and expiry and stamps the paid payment
  /// `reference` fulfilled, atomically. Same guard as [`OrderStore::fulfil_order`].
  async fn fulfil_subscription(&self, reference: &str, vendor: &VendorProfile) -> StoreResult<bool>;
}

/// Everything the marketplace service needs from persistence.
pub trait MarketStore: CatalogStore + CartStore + OrderStore + PaymentStore {}

impl<T> MarketStore for T where T: CatalogStore + CartStore + OrderStore + PaymentStore {}
