// apps/marketplace/tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use bazaar::cart::CartItem;
use bazaar::catalog::{Buyer, Product, VendorProfile};
use bazaar::gateway::{
  Authorization, ChargeReport, GatewayError, InitializeRequest, PaymentGateway, PaystackConfig,
};
use bazaar::order::Order;
use bazaar::payment::{Payment, PaymentStatus};
use bazaar::store::{CartStore, CatalogStore, MemoryStore, OrderStore, PaymentStore, StoreError, StoreResult};
use bazaar::subscription::{SubscriptionPolicy, SubscriptionStatus, VendorPlan};
use bazaar::FeeSchedule;
use chrono::{Duration, Utc};
use marketplace::config::{AppConfig, LogFormat};
use marketplace::state::AppState;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const SECRET: &str = "sk_test_marketplace_secret";

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

/// Builds the actix test service over `$state` with the real routes.
macro_rules! test_app {
  ($state:expr) => {
    actix_web::test::init_service(
      actix_web::App::new()
        .app_data(actix_web::web::Data::new($state.clone()))
        .configure(marketplace::web::configure_app_routes),
    )
    .await
  };
}

/// Gateway double: records initialize calls and answers verify from canned reports.
#[derive(Default)]
pub struct StubGateway {
  pub initialized: Mutex<Vec<InitializeRequest>>,
  pub reports: Mutex<HashMap<String, ChargeReport>>,
  pub refuse_initialize: AtomicBool,
}

impl StubGateway {
  pub fn report(&self, report: ChargeReport) {
    self.reports.lock().unwrap().insert(report.reference.clone(), report);
  }

  pub fn last_initialized(&self) -> Option<InitializeRequest> {
    self.initialized.lock().unwrap().last().cloned()
  }

  pub fn initialize_count(&self) -> usize {
    self.initialized.lock().unwrap().len()
  }
}

#[async_trait]
impl PaymentGateway for StubGateway {
  async fn initialize(&self, request: &InitializeRequest) -> Result<Authorization, GatewayError> {
    if self.refuse_initialize.load(Ordering::SeqCst) {
      return Err(GatewayError::Status {
        status: 503,
        message: "maintenance".to_string(),
      });
    }
    self.initialized.lock().unwrap().push(request.clone());
    Ok(Authorization {
      authorization_url: format!("https://checkout.test/{}", request.reference),
      access_code: format!("ac_{}", request.reference),
      reference: request.reference.clone(),
    })
  }

  async fn verify(&self, reference: &str) -> Result<ChargeReport, GatewayError> {
    self
      .reports
      .lock()
      .unwrap()
      .get(reference)
      .cloned()
      .ok_or_else(|| GatewayError::Status {
        status: 404,
        message: "Transaction not found".to_string(),
      })
  }
}

/// `MemoryStore` whose fulfilments can be made to fail, as a dropped database
/// connection would.
#[derive(Clone, Default)]
pub struct FlakyStore {
  pub inner: MemoryStore,
  failing_fulfilments: Arc<AtomicUsize>,
}

impl FlakyStore {
  /// The next `n` fulfilments fail without changing anything.
  pub fn fail_fulfilments(&self, n: usize) {
    self.failing_fulfilments.store(n, Ordering::SeqCst);
  }

  fn injected_failure(&self) -> StoreResult<()> {
    let remaining = self.failing_fulfilments.load(Ordering::SeqCst);
    if remaining == 0 {
      return Ok(());
    }
    self.failing_fulfilments.store(remaining - 1, Ordering::SeqCst);
    Err(StoreError::Backend(anyhow::anyhow!("connection reset by peer")))
  }
}

#[async_trait]
impl CatalogStore for FlakyStore {
  async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    self.inner.product(id).await
  }

  async fn active_products(&self) -> StoreResult<Vec<Product>> {
    self.inner.active_products().await
  }

  async fn products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
    self.inner.products_by_ids(ids).await
  }

  async fn insert_product(&self, product: &Product) -> StoreResult<()> {
    self.inner.insert_product(product).await
  }

  async fn active_product_count(&self, vendor_id: Uuid) -> StoreResult<i64> {
    self.inner.active_product_count(vendor_id).await
  }

  async fn vendor(&self, id: Uuid) -> StoreResult<Option<VendorProfile>> {
    self.inner.vendor(id).await
  }

  async fn vendors_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<VendorProfile>> {
    self.inner.vendors_by_ids(ids).await
  }

  async fn insert_vendor(&self, vendor: &VendorProfile) -> StoreResult<()> {
    self.inner.insert_vendor(vendor).await
  }

  async fn update_vendor_subscription(&self, vendor: &VendorProfile) -> StoreResult<()> {
    self.inner.update_vendor_subscription(vendor).await
  }

  async fn plan(&self, id: Uuid) -> StoreResult<Option<VendorPlan>> {
    self.inner.plan(id).await
  }

  async fn buyer(&self, id: Uuid) -> StoreResult<Option<Buyer>> {
    self.inner.buyer(id).await
  }
}

#[async_trait]
impl CartStore for FlakyStore {
  async fn cart_items(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
    self.inner.cart_items(user_id).await
  }

  async fn set_cart_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> StoreResult<CartItem> {
    self.inner.set_cart_quantity(user_id, product_id, quantity).await
  }

  async fn remove_cart_item(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
    self.inner.remove_cart_item(user_id, product_id).await
  }
}

#[async_trait]
impl OrderStore for FlakyStore {
  async fn insert_order_with_payment(&self, order: &Order, payment: &Payment) -> StoreResult<()> {
    self.inner.insert_order_with_payment(order, payment).await
  }

  async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
    self.inner.order(id).await
  }

  async fn fulfil_order(&self, reference: &str, order_id: Uuid) -> StoreResult<bool> {
    self.injected_failure()?;
    self.inner.fulfil_order(reference, order_id).await
  }
}

#[async_trait]
impl PaymentStore for FlakyStore {
  async fn insert_payment(&self, payment: &Payment) -> StoreResult<()> {
    self.inner.insert_payment(payment).await
  }

  async fn payment(&self, reference: &str) -> StoreResult<Option<Payment>> {
    self.inner.payment(reference).await
  }

  async fn transition_payment(&self, reference: &str, to: PaymentStatus, gateway_response: Option<serde_json::Value>) -> StoreResult<bool> {
    self.inner.transition_payment(reference, to, gateway_response).await
  }

  async fn fulfil_subscription(&self, reference: &str, vendor: &VendorProfile) -> StoreResult<bool> {
    self.injected_failure()?;
    self.inner.fulfil_subscription(reference, vendor).await
  }
}

pub fn test_config() -> AppConfig {
  AppConfig {
    server_host: "127.0.0.1".to_string(),
    server_port: 8080,
    database_url: "postgres://unused".to_string(),
    app_base_url: "http://shop.test".to_string(),
    paystack: PaystackConfig::new(SECRET),
    fees: FeeSchedule::default(),
    subscription: SubscriptionPolicy::default(),
    run_migrations: false,
    log_format: LogFormat::Pretty,
  }
}

pub fn naira(s: &str) -> Decimal {
  s.parse().unwrap()
}

pub fn plan(id: u128, name: &str, price: &str, quota: i32) -> VendorPlan {
  VendorPlan {
    id: Uuid::from_u128(id),
    name: name.to_string(),
    price: naira(price),
    product_quota: quota,
  }
}

/// A seeded marketplace on the in-memory store.
pub struct TestMarket {
  pub store: MemoryStore,
  /// What the app runs on: `store` behind a switch for failing fulfilments.
  pub faults: FlakyStore,
  pub gateway: Arc<StubGateway>,
  pub state: AppState,
  pub buyer: Buyer,
  pub starter: VendorPlan,
  pub growth: VendorPlan,
  pub pro: VendorPlan,
}

impl TestMarket {
  pub async fn new() -> Self {
    setup_tracing();
    let store = MemoryStore::new();
    let gateway = Arc::new(StubGateway::default());

    let starter = plan(1, "Starter", "0", 5);
    let growth = plan(2, "Growth", "2500", 50);
    let pro = plan(3, "Pro", "5000", 500);
    for p in [&starter, &growth, &pro] {
      store.insert_plan(p.clone()).await;
    }

    let buyer = Buyer {
      id: Uuid::new_v4(),
      email: "ada@example.com".to_string(),
      name: Some("Ada".to_string()),
    };
    store.insert_buyer(buyer.clone()).await;

    let faults = FlakyStore {
      inner: store.clone(),
      ..FlakyStore::default()
    };
    let state = AppState::new(Arc::new(faults.clone()), gateway.clone(), test_config());
    Self {
      store,
      faults,
      gateway,
      state,
      buyer,
      starter,
      growth,
      pro,
    }
  }

  /// An active vendor with `days_left` days of its cycle remaining.
  pub async fn vendor(&self, payout_account: Option<&str>, plan: &VendorPlan, days_left: i64) -> VendorProfile {
    let vendor = VendorProfile {
      id: Uuid::new_v4(),
      store_name: format!("Store {}", payout_account.unwrap_or("house")),
      email: format!("{}@vendors.test", payout_account.unwrap_or("house").to_ascii_lowercase()),
      payout_account: payout_account.map(String::from),
      plan_id: plan.id,
      subscription_status: SubscriptionStatus::Active,
      // A few minutes of slack so whole-day counts are stable during the test.
      subscription_expires_at: Utc::now() + Duration::days(days_left) + Duration::minutes(5),
      created_at: Utc::now(),
    };
    self.store.insert_vendor(&vendor).await.unwrap();
    vendor
  }

  pub async fn product(&self, vendor: &VendorProfile, price: &str, stock: i32) -> Product {
    let product = Product {
      id: Uuid::new_v4(),
      vendor_id: vendor.id,
      name: format!("Item at {}", price),
      description: None,
      unit_price: naira(price),
      stock_quantity: stock,
      active: true,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    };
    self.store.insert_product(&product).await.unwrap();
    product
  }
}

/// A gateway transaction object as the verify endpoint and webhooks carry it.
pub fn transaction(reference: &str, status: &str, amount: i64) -> serde_json::Value {
  json!({
    "id": 4099260516_i64,
    "reference": reference,
    "status": status,
    "amount": amount,
    "currency": "NGN",
    "gateway_response": "Approved",
  })
}

pub fn charge_report(reference: &str, status: &str, amount: i64) -> ChargeReport {
  ChargeReport::from_transaction(transaction(reference, status, amount)).unwrap()
}
