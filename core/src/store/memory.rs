// core/src/store/memory.rs

use super::{CartStore, CatalogStore, OrderStore, PaymentStore, StoreError, StoreResult};
use crate::cart::CartItem;
use crate::catalog::{Buyer, Product, VendorProfile};
use crate::order::Order;
use crate::payment::{Payment, PaymentStatus};
use crate::subscription::VendorPlan;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
  products: HashMap<Uuid, Product>,
  vendors: HashMap<Uuid, VendorProfile>,
  plans: HashMap<Uuid, VendorPlan>,
  buyers: HashMap<Uuid, Buyer>,
  /// Per user, in insertion order.
  carts: HashMap<Uuid, Vec<CartItem>>,
  orders: HashMap<Uuid, Order>,
  payments: HashMap<String, Payment>,
}

/// A thread-safe in-memory store.
///
/// Every operation takes the one table lock, so compare-and-set transitions are
/// atomic. Clones share the same tables.
#[derive(Default, Clone)]
pub struct MemoryStore {
  tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn insert_plan(&self, plan: VendorPlan) {
    self.tables.write().await.plans.insert(plan.id, plan);
  }

  pub async fn insert_buyer(&self, buyer: Buyer) {
    self.tables.write().await.buyers.insert(buyer.id, buyer);
  }
}

#[async_trait]
impl CatalogStore for MemoryStore {
  async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    Ok(self.tables.read().await.products.get(&id).cloned())
  }

  async fn active_products(&self) -> StoreResult<Vec<Product>> {
    let tables = self.tables.read().await;
    let mut products: Vec<Product> = tables.products.values().filter(|p| p.active).cloned().collect();
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(products)
  }

  async fn products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
    let tables = self.tables.read().await;
    Ok(ids.iter().filter_map(|id| tables.products.get(id).cloned()).collect())
  }

  async fn insert_product(&self, product: &Product) -> StoreResult<()> {
    let mut tables = self.tables.write().await;
    if tables.products.contains_key(&product.id) {
      return Err(StoreError::Duplicate {
        entity: "product",
        key: product.id.to_string(),
      });
    }
    tables.products.insert(product.id, product.clone());
    Ok(())
  }

  async fn active_product_count(&self, vendor_id: Uuid) -> StoreResult<i64> {
    let tables = self.tables.read().await;
    let count = tables
      .products
      .values()
      .filter(|p| p.vendor_id == vendor_id && p.active)
      .count();
    Ok(count as i64)
  }

  async fn vendor(&self, id: Uuid) -> StoreResult<Option<VendorProfile>> {
    Ok(self.tables.read().await.vendors.get(&id).cloned())
  }

  async fn vendors_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<VendorProfile>> {
    let tables = self.tables.read().await;
    Ok(ids.iter().filter_map(|id| tables.vendors.get(id).cloned()).collect())
  }

  async fn insert_vendor(&self, vendor: &VendorProfile) -> StoreResult<()> {
    let mut tables = self.tables.write().await;
    if tables.vendors.contains_key(&vendor.id) {
      return Err(StoreError::Duplicate {
        entity: "vendor",
        key: vendor.id.to_string(),
      });
    }
    tables.vendors.insert(vendor.id, vendor.clone());
    Ok(())
  }

  async fn update_vendor_subscription(&self, vendor: &VendorProfile) -> StoreResult<()> {
    let mut tables = self.tables.write().await;
    if let Some(stored) = tables.vendors.get_mut(&vendor.id) {
      stored.plan_id = vendor.plan_id;
      stored.subscription_status = vendor.subscription_status;
      stored.subscription_expires_at = vendor.subscription_expires_at;
    }
    Ok(())
  }

  async fn plan(&self, id: Uuid) -> StoreResult<Option<VendorPlan>> {
    Ok(self.tables.read().await.plans.get(&id).cloned())
  }

  async fn buyer(&self, id: Uuid) -> StoreResult<Option<Buyer>> {
    Ok(self.tables.read().await.buyers.get(&id).cloned())
  }
}

#[async_trait]
impl CartStore for MemoryStore {
  async fn cart_items(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
    Ok(self.tables.read().await.carts.get(&user_id).cloned().unwrap_or_default())
  }

  async fn set_cart_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> StoreResult<CartItem> {
    let mut tables = self.tables.write().await;
    let cart = tables.carts.entry(user_id).or_default();
    if let Some(item) = cart.iter_mut().find(|i| i.product_id == product_id) {
      item.quantity = quantity;
      return Ok(item.clone());
    }
    let item = CartItem {
      id: Uuid::new_v4(),
      user_id,
      product_id,
      quantity,
      added_at: Utc::now(),
    };
    cart.push(item.clone());
    Ok(item)
  }

  async fn remove_cart_item(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
    let mut tables = self.tables.write().await;
    let Some(cart) = tables.carts.get_mut(&user_id) else {
      return Ok(false);
    };
    let before = cart.len();
    cart.retain(|i| i.product_id != product_id);
    Ok(cart.len() != before)
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn insert_order_with_payment(&self, order: &Order, payment: &Payment) -> StoreResult<()> {
    let mut tables = self.tables.write().await;
    if tables.payments.contains_key(&payment.reference) {
      return Err(StoreError::Duplicate {
        entity: "payment",
        key: payment.reference.clone(),
      });
    }
    tables.orders.insert(order.id, order.clone());
    tables.payments.insert(payment.reference.clone(), payment.clone());
    Ok(())
  }

  async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
    Ok(self.tables.read().await.orders.get(&id).cloned())
  }

  async fn fulfil_order(&self, reference: &str, order_id: Uuid) -> StoreResult<bool> {
    let mut tables = self.tables.write().await;
    if !claim_fulfilment(&mut tables, reference) {
      return Ok(false);
    }
    let (buyer_id, lines) = match tables.orders.get_mut(&order_id) {
      Some(order) if !order.paid => {
        order.paid = true;
        (order.buyer_id, order.lines.clone())
      }
      _ => return Ok(true),
    };
    for line in lines {
      if let Some(product) = tables.products.get_mut(&line.product_id) {
        product.stock_quantity = (product.stock_quantity - line.quantity).max(0);
      }
    }
    tables.carts.remove(&buyer_id);
    Ok(true)
  }
}

/// Stamps a paid, unfulfilled payment fulfilled. Callers hold the write lock for
/// the rest of the change, so the whole fulfilment is atomic.
fn claim_fulfilment(tables: &mut Tables, reference: &str) -> bool {
  match tables.payments.get_mut(reference) {
    Some(payment) if payment.awaits_fulfilment() => {
      let now = Utc::now();
      payment.fulfilled_at = Some(now);
      payment.updated_at = now;
      true
    }
    _ => false,
  }
}

#[async_trait]
impl PaymentStore for MemoryStore {
  async fn insert_payment(&self, payment: &Payment) -> StoreResult<()> {
    let mut tables = self.tables.write().await;
    if tables.payments.contains_key(&payment.reference) {
      return Err(StoreError::Duplicate {
        entity: "payment",
        key: payment.reference.clone(),
      });
    }
    tables.payments.insert(payment.reference.clone(), payment.clone());
    Ok(())
  }

  async fn payment(&self, reference: &str) -> StoreResult<Option<Payment>> {
    Ok(self.tables.read().await.payments.get(reference).cloned())
  }

  async fn transition_payment(&self, reference: &str, to: PaymentStatus, gateway_response: Option<JsonValue>) -> StoreResult<bool> {
    let mut tables = self.tables.write().await;
    match tables.payments.get_mut(reference) {
      Some(payment) if payment.status == PaymentStatus::Pending => {
        payment.status = to;
        payment.gateway_response = gateway_response;
        payment.updated_at = Utc::now();
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn fulfil_subscription(&self, reference: &str, vendor: &VendorProfile) -> StoreResult<bool> {
    let mut tables = self.tables.write().await;
    if !claim_fulfilment(&mut tables, reference) {
      return Ok(false);
    }
    if let Some(stored) = tables.vendors.get_mut(&vendor.id) {
      stored.plan_id = vendor.plan_id;
      stored.subscription_status = vendor.subscription_status;
      stored.subscription_expires_at = vendor.subscription_expires_at;
    }
    Ok(true)
  }
}
