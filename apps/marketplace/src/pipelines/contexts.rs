// apps/marketplace/src/pipelines/contexts.rs

//! Per-request data the pipelines operate on. Handlers receive these wrapped in
//! `bazaar::ContextData`.

use crate::state::AppState;
use actix_web::web::Bytes;
use bazaar::cart::CartItem;
use bazaar::catalog::{Buyer, Product, VendorProfile};
use bazaar::gateway::{Authorization, ChargeReport, WebhookEvent};
use bazaar::order::{Delivery, Order};
use bazaar::payment::{Payment, Settlement};
use bazaar::subscription::{PlanChange, SubscriptionStatus, VendorPlan};
use bazaar::{Kobo, LineItem, SplitPlan};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

// --- Cart ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
  /// Adds to whatever quantity is already in the cart.
  Add(i32),
  /// Sets the quantity outright; zero removes the item.
  Set(i32),
  Remove,
}

#[derive(Clone)]
pub struct CartCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub product_id: Uuid,
  pub change: CartChange,
  /// Quantity the item ends up with. Zero means it leaves the cart.
  pub target_quantity: i32,
  pub product: Option<Product>,
  pub updated_item: Option<CartItem>,
  pub removed: bool,
}

impl CartCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, product_id: Uuid, change: CartChange) -> Self {
    Self {
      app_state,
      user_id,
      product_id,
      change,
      target_quantity: 0,
      product: None,
      updated_item: None,
      removed: false,
    }
  }
}

// --- Checkout ---

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub buyer_id: Uuid,
  pub delivery: Delivery,
  pub buyer: Option<Buyer>,
  pub lines: Vec<LineItem>,
  pub plan: Option<SplitPlan>,
  pub order: Option<Order>,
  pub authorization: Option<Authorization>,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, buyer_id: Uuid, delivery: Delivery) -> Self {
    Self {
      app_state,
      buyer_id,
      delivery,
      buyer: None,
      lines: Vec::new(),
      plan: None,
      order: None,
      authorization: None,
    }
  }
}

// --- Payment confirmation ---

#[derive(Clone)]
pub struct VerifyPaymentCtxData {
  pub app_state: AppState,
  pub reference: String,
  pub payment: Option<Payment>,
  pub report: Option<ChargeReport>,
  pub settlement: Option<Settlement>,
}

impl VerifyPaymentCtxData {
  pub fn new(app_state: AppState, reference: String) -> Self {
    Self {
      app_state,
      reference,
      payment: None,
      report: None,
      settlement: None,
    }
  }
}

#[derive(Clone)]
pub struct WebhookCtxData {
  pub app_state: AppState,
  /// Exactly the bytes the gateway signed.
  pub body: Bytes,
  pub signature: Option<String>,
  pub event: Option<WebhookEvent>,
  pub settlement: Option<Settlement>,
  /// Set when the event was acknowledged without acting on it.
  pub ignored: bool,
}

impl WebhookCtxData {
  pub fn new(app_state: AppState, body: Bytes, signature: Option<String>) -> Self {
    Self {
      app_state,
      body,
      signature,
      event: None,
      settlement: None,
      ignored: false,
    }
  }
}

// --- Vendor subscriptions ---

#[derive(Clone)]
pub struct PlanChangeCtxData {
  pub app_state: AppState,
  pub vendor_id: Uuid,
  pub target_plan_id: Uuid,
  pub immediate: bool,
  pub now: DateTime<Utc>,
  pub vendor: Option<VendorProfile>,
  pub current_plan: Option<VendorPlan>,
  pub target_plan: Option<VendorPlan>,
  /// Status as evaluated at `now`, not as stored.
  pub status: Option<SubscriptionStatus>,
  pub quote: Option<PlanChange>,
  pub applied: bool,
  pub reference: Option<String>,
  pub authorization: Option<Authorization>,
}

impl PlanChangeCtxData {
  pub fn new(app_state: AppState, vendor_id: Uuid, target_plan_id: Uuid, immediate: bool) -> Self {
    Self {
      app_state,
      vendor_id,
      target_plan_id,
      immediate,
      now: Utc::now(),
      vendor: None,
      current_plan: None,
      target_plan: None,
      status: None,
      quote: None,
      applied: false,
      reference: None,
      authorization: None,
    }
  }

  pub fn charges(&self) -> bool {
    matches!(self.quote, Some(PlanChange::Charge { .. }))
  }
}

#[derive(Clone)]
pub struct RenewalCtxData {
  pub app_state: AppState,
  pub vendor_id: Uuid,
  pub now: DateTime<Utc>,
  pub vendor: Option<VendorProfile>,
  pub plan: Option<VendorPlan>,
  pub amount: Kobo,
  pub reference: Option<String>,
  pub authorization: Option<Authorization>,
}

impl RenewalCtxData {
  pub fn new(app_state: AppState, vendor_id: Uuid) -> Self {
    Self {
      app_state,
      vendor_id,
      now: Utc::now(),
      vendor: None,
      plan: None,
      amount: Kobo::ZERO,
      reference: None,
      authorization: None,
    }
  }
}

// --- Vendor catalog ---

#[derive(Clone)]
pub struct OnboardVendorCtxData {
  pub app_state: AppState,
  pub store_name: String,
  pub email: String,
  pub payout_account: Option<String>,
  pub plan_id: Uuid,
  pub plan: Option<VendorPlan>,
  pub vendor: Option<VendorProfile>,
}

#[derive(Clone)]
pub struct ListProductCtxData {
  pub app_state: AppState,
  pub vendor_id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub unit_price: Decimal,
  pub stock_quantity: i32,
  pub product: Option<Product>,
}
