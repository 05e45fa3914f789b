// core/src/cart.rs

//! Cart aggregation: pairs stored cart items with their products and vendors and
//! prices the result.

use crate::catalog::{Product, VendorProfile};
use crate::money::Kobo;
use crate::split::{LineItem, SplitError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
  pub id: Uuid,
  pub user_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub added_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
  #[error("Cart is empty")]
  Empty,

  #[error("Product {0} is no longer available")]
  ProductUnavailable(Uuid),

  #[error("Only {available} of product {product_id} left in stock")]
  InsufficientStock { product_id: Uuid, available: i32 },

  #[error("Vendor {0} for a cart product does not exist")]
  UnknownVendor(Uuid),
}

/// A cart item joined with what it costs and who sells it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
  pub product_id: Uuid,
  pub product_name: String,
  pub vendor_id: Uuid,
  pub unit_price: Decimal,
  pub quantity: i32,
  pub line_total: Kobo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
  pub lines: Vec<CartLine>,
  pub subtotal: Kobo,
}

/// Prices a cart for display. Items whose product has disappeared are skipped.
pub fn summarize(items: &[CartItem], products: &HashMap<Uuid, Product>) -> Result<CartSummary, SplitError> {
  let mut lines = Vec::with_capacity(items.len());
  let mut exact = Decimal::ZERO;
  for item in items {
    let Some(product) = products.get(&item.product_id) else {
      continue;
    };
    let line_total = product.unit_price * Decimal::from(item.quantity);
    exact += line_total;
    lines.push(CartLine {
      product_id: product.id,
      product_name: product.name.clone(),
      vendor_id: product.vendor_id,
      unit_price: product.unit_price,
      quantity: item.quantity,
      line_total: Kobo::from_naira(line_total)?,
    });
  }
  Ok(CartSummary {
    lines,
    subtotal: Kobo::from_naira(exact)?,
  })
}

/// Builds split line items for checkout, checking availability and stock.
pub fn checkout_lines(
  items: &[CartItem],
  products: &HashMap<Uuid, Product>,
  vendors: &HashMap<Uuid, VendorProfile>,
) -> Result<Vec<LineItem>, CartError> {
  if items.is_empty() {
    return Err(CartError::Empty);
  }
  items
    .iter()
    .map(|item| {
      let product = products
        .get(&item.product_id)
        .filter(|p| p.active)
        .ok_or(CartError::ProductUnavailable(item.product_id))?;
      if !product.has_stock_for(item.quantity) {
        return Err(CartError::InsufficientStock {
          product_id: product.id,
          available: product.stock_quantity,
        });
      }
      let vendor = vendors
        .get(&product.vendor_id)
        .ok_or(CartError::UnknownVendor(product.vendor_id))?;
      Ok(LineItem {
        product_id: product.id,
        vendor_id: vendor.id,
        payout_account: vendor.payout_account.clone(),
        unit_price: product.unit_price,
        quantity: item.quantity,
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscription::SubscriptionStatus;
  use rust_decimal_macros::dec;

  fn product(vendor_id: Uuid, price: Decimal, stock: i32) -> Product {
    Product {
      id: Uuid::new_v4(),
      vendor_id,
      name: "Ankara tote".into(),
      description: None,
      unit_price: price,
      stock_quantity: stock,
      active: true,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  fn vendor(payout_account: Option<&str>) -> VendorProfile {
    VendorProfile {
      id: Uuid::new_v4(),
      store_name: "Iya Basira Stores".into(),
      email: "store@example.com".into(),
      payout_account: payout_account.map(str::to_string),
      plan_id: Uuid::new_v4(),
      subscription_status: SubscriptionStatus::Active,
      subscription_expires_at: Utc::now(),
      created_at: Utc::now(),
    }
  }

  fn item(product_id: Uuid, quantity: i32) -> CartItem {
    CartItem {
      id: Uuid::new_v4(),
      user_id: Uuid::nil(),
      product_id,
      quantity,
      added_at: Utc::now(),
    }
  }

  #[test]
  fn summary_prices_each_line_and_the_whole_cart() {
    let v = vendor(Some("ACCT_1"));
    let p1 = product(v.id, dec!(1200.50), 10);
    let p2 = product(v.id, dec!(300), 10);
    let products = HashMap::from([(p1.id, p1.clone()), (p2.id, p2.clone())]);

    let summary = summarize(&[item(p1.id, 2), item(p2.id, 1)], &products).unwrap();
    assert_eq!(summary.lines.len(), 2);
    assert_eq!(summary.lines[0].line_total, Kobo(240_100));
    assert_eq!(summary.subtotal, Kobo(270_100));
  }

  #[test]
  fn checkout_lines_carry_vendor_payout_accounts() {
    let v = vendor(Some("ACCT_1"));
    let p = product(v.id, dec!(50), 3);
    let products = HashMap::from([(p.id, p.clone())]);
    let vendors = HashMap::from([(v.id, v.clone())]);

    let lines = checkout_lines(&[item(p.id, 3)], &products, &vendors).unwrap();
    assert_eq!(lines[0].payout_account.as_deref(), Some("ACCT_1"));
    assert_eq!(lines[0].quantity, 3);
  }

  #[test]
  fn checkout_lines_enforce_stock_and_availability() {
    let v = vendor(None);
    let mut p = product(v.id, dec!(50), 2);
    let products = HashMap::from([(p.id, p.clone())]);
    let vendors = HashMap::from([(v.id, v.clone())]);

    assert_eq!(
      checkout_lines(&[item(p.id, 3)], &products, &vendors),
      Err(CartError::InsufficientStock {
        product_id: p.id,
        available: 2
      })
    );

    p.active = false;
    let products = HashMap::from([(p.id, p.clone())]);
    assert_eq!(
      checkout_lines(&[item(p.id, 1)], &products, &vendors),
      Err(CartError::ProductUnavailable(p.id))
    );
    assert_eq!(checkout_lines(&[], &products, &vendors), Err(CartError::Empty));
  }
}
