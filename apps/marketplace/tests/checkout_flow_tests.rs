// apps/marketplace/tests/checkout_flow_tests.rs

#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use bazaar::order::Delivery;
use bazaar::payment::PaymentStatus;
use bazaar::store::{CatalogStore, CartStore, OrderStore, PaymentStore};
use bazaar::Kobo;
use common::{charge_report, transaction, TestMarket};
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::atomic::Ordering;
use uuid::Uuid;

fn add_item(user_id: Uuid, product_id: Uuid, quantity: i32) -> test::TestRequest {
  test::TestRequest::post()
    .uri("/api/v1/cart/items")
    .insert_header(("X-User-ID", user_id.to_string()))
    .set_json(json!({ "product_id": product_id, "quantity": quantity }))
}

fn checkout(user_id: Uuid, body: Value) -> test::TestRequest {
  test::TestRequest::post()
    .uri("/api/v1/checkout")
    .insert_header(("X-User-ID", user_id.to_string()))
    .set_json(body)
}

fn webhook(body: &str, signature: Option<&str>) -> test::TestRequest {
  let mut req = test::TestRequest::post()
    .uri("/api/v1/webhooks/paystack")
    .insert_header(("content-type", "application/json"))
    .set_payload(body.to_string());
  if let Some(signature) = signature {
    req = req.insert_header(("x-paystack-signature", signature.to_string()));
  }
  req
}

fn charge_event(event: &str, reference: &str, status: &str, amount: i64) -> String {
  json!({ "event": event, "data": transaction(reference, status, amount) }).to_string()
}

/// Two vendors, ₦2,500 x2 from one and ₦1,000 x1 from the other, in the buyer's cart.
async fn market_with_cart() -> (TestMarket, Uuid, Uuid) {
  let market = TestMarket::new().await;
  let vendor_a = market.vendor(Some("ACCT_A"), &market.growth, 20).await;
  let vendor_b = market.vendor(Some("ACCT_B"), &market.growth, 20).await;
  let tote = market.product(&vendor_a, "2500.00", 5).await;
  let scarf = market.product(&vendor_b, "1000.00", 3).await;
  market.store.set_cart_quantity(market.buyer.id, tote.id, 2).await.unwrap();
  market.store.set_cart_quantity(market.buyer.id, scarf.id, 1).await.unwrap();
  (market, tote.id, scarf.id)
}

#[actix_rt::test]
#[serial]
async fn checkout_charges_subtotal_plus_fee_with_vendor_split() {
  let (market, _, _) = market_with_cart().await;
  let app = test_app!(market.state);

  let resp = test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body: Value = test::read_body_json(resp).await;

  // ₦6,000 subtotal; fee = 1.5% + ₦100 = ₦190.
  assert_eq!(body["subtotal"], 600_000);
  assert_eq!(body["fee"], 19_000);
  assert_eq!(body["amount"], 619_000);
  let reference = body["reference"].as_str().unwrap().to_string();
  assert!(reference.starts_with("ord_"));

  let request = market.gateway.last_initialized().expect("gateway was called");
  assert_eq!(request.amount, Kobo(619_000));
  assert_eq!(request.email, "ada@example.com");
  assert_eq!(
    request.callback_url.as_deref(),
    Some(format!("http://shop.test/api/v1/payments/{}/verify", reference).as_str())
  );
  let split = request.split.expect("split payload");
  assert_eq!(split.bearer_type, "account");
  let shares: Vec<(String, i64)> = split.subaccounts.iter().map(|s| (s.subaccount.clone(), s.share)).collect();
  assert_eq!(shares, vec![("ACCT_A".to_string(), 500_000), ("ACCT_B".to_string(), 100_000)]);

  let payment = market.store.payment(&reference).await.unwrap().unwrap();
  assert_eq!(payment.status, PaymentStatus::Pending);
  assert_eq!(payment.amount, Kobo(619_000));
}

#[actix_rt::test]
#[serial]
async fn fee_is_capped_for_large_orders() {
  let market = TestMarket::new().await;
  let vendor = market.vendor(Some("ACCT_A"), &market.growth, 20).await;
  let generator = market.product(&vendor, "450000.00", 2).await;
  market.store.set_cart_quantity(market.buyer.id, generator.id, 1).await.unwrap();
  let app = test_app!(market.state);

  let resp = test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["fee"], 200_000);
  assert_eq!(body["amount"], 45_000_000 + 200_000);
}

#[actix_rt::test]
#[serial]
async fn order_too_large_for_kobo_is_rejected() {
  let market = TestMarket::new().await;
  let vendor = market.vendor(Some("ACCT_A"), &market.growth, 20).await;
  // Each line fits in kobo on its own; together they do not.
  let jet = market.product(&vendor, "50000000000000000", 1).await;
  let yacht = market.product(&vendor, "50000000000000000", 1).await;
  market.store.set_cart_quantity(market.buyer.id, jet.id, 1).await.unwrap();
  market.store.set_cart_quantity(market.buyer.id, yacht.id, 1).await.unwrap();
  let app = test_app!(market.state);

  let resp = test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(market.gateway.initialize_count(), 0);
  assert_eq!(market.store.cart_items(market.buyer.id).await.unwrap().len(), 2);
}

#[actix_rt::test]
#[serial]
async fn vendor_without_payout_account_goes_unsplit() {
  let market = TestMarket::new().await;
  let house = market.vendor(None, &market.growth, 20).await;
  let mug = market.product(&house, "1500.00", 4).await;
  market.store.set_cart_quantity(market.buyer.id, mug.id, 1).await.unwrap();
  let app = test_app!(market.state);

  let resp = test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  assert!(market.gateway.last_initialized().unwrap().split.is_none());
}

#[actix_rt::test]
#[serial]
async fn webhook_settles_order_once() {
  let (market, tote, scarf) = market_with_cart().await;
  let app = test_app!(market.state);

  let body: Value = test::read_body_json(test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await).await;
  let reference = body["reference"].as_str().unwrap().to_string();
  let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();

  let event = charge_event("charge.success", &reference, "success", 619_000);
  let signature = market.state.verifier.sign(event.as_bytes());

  let resp = test::call_service(&app, webhook(&event, Some(&signature)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let ack: Value = test::read_body_json(resp).await;
  assert_eq!(ack["status"], "processed");
  assert_eq!(ack["settlement"], json!({ "applied": "paid" }));

  let payment = market.store.payment(&reference).await.unwrap().unwrap();
  assert_eq!(payment.status, PaymentStatus::Paid);
  assert_eq!(payment.gateway_response.unwrap()["gateway_response"], "Approved");
  assert!(market.store.order(order_id).await.unwrap().unwrap().paid);
  assert_eq!(market.store.product(tote).await.unwrap().unwrap().stock_quantity, 3);
  assert_eq!(market.store.product(scarf).await.unwrap().unwrap().stock_quantity, 2);
  assert!(market.store.cart_items(market.buyer.id).await.unwrap().is_empty());

  // Gateways redeliver; the second delivery changes nothing.
  let resp = test::call_service(&app, webhook(&event, Some(&signature)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let ack: Value = test::read_body_json(resp).await;
  assert_eq!(ack["settlement"], "already_paid");
  assert_eq!(market.store.product(tote).await.unwrap().unwrap().stock_quantity, 3);
}

#[actix_rt::test]
#[serial]
async fn failed_fulfilment_is_retried_by_the_next_delivery() {
  let (market, tote, scarf) = market_with_cart().await;
  let app = test_app!(market.state);

  let body: Value = test::read_body_json(test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await).await;
  let reference = body["reference"].as_str().unwrap().to_string();
  let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();
  let event = charge_event("charge.success", &reference, "success", 619_000);
  let signature = market.state.verifier.sign(event.as_bytes());

  market.faults.fail_fulfilments(1);
  let resp = test::call_service(&app, webhook(&event, Some(&signature)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

  // The charge is recorded but nothing it bought has been applied.
  let payment = market.store.payment(&reference).await.unwrap().unwrap();
  assert_eq!(payment.status, PaymentStatus::Paid);
  assert!(payment.fulfilled_at.is_none());
  assert!(!market.store.order(order_id).await.unwrap().unwrap().paid);
  assert_eq!(market.store.product(tote).await.unwrap().unwrap().stock_quantity, 5);
  assert_eq!(market.store.cart_items(market.buyer.id).await.unwrap().len(), 2);

  let resp = test::call_service(&app, webhook(&event, Some(&signature)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let ack: Value = test::read_body_json(resp).await;
  assert_eq!(ack["settlement"], "already_paid");

  assert!(market.store.payment(&reference).await.unwrap().unwrap().fulfilled_at.is_some());
  assert!(market.store.order(order_id).await.unwrap().unwrap().paid);
  assert_eq!(market.store.product(tote).await.unwrap().unwrap().stock_quantity, 3);
  assert_eq!(market.store.product(scarf).await.unwrap().unwrap().stock_quantity, 2);
  assert!(market.store.cart_items(market.buyer.id).await.unwrap().is_empty());

  // A third delivery takes nothing more out of stock.
  test::call_service(&app, webhook(&event, Some(&signature)).to_request()).await;
  assert_eq!(market.store.product(tote).await.unwrap().unwrap().stock_quantity, 3);
}

#[actix_rt::test]
#[serial]
async fn verify_completes_a_paid_but_unfulfilled_order() {
  let (market, tote, _) = market_with_cart().await;
  let app = test_app!(market.state);

  let body: Value = test::read_body_json(test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await).await;
  let reference = body["reference"].as_str().unwrap().to_string();
  let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();
  let verify_uri = format!("/api/v1/payments/{}/verify", reference);

  market.gateway.report(charge_report(&reference, "success", 619_000));
  market.faults.fail_fulfilments(1);
  let resp = test::call_service(&app, test::TestRequest::get().uri(&verify_uri).to_request()).await;
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
  assert!(!market.store.order(order_id).await.unwrap().unwrap().paid);

  // The gateway is not needed to finish the job.
  market.gateway.reports.lock().unwrap().clear();
  let resp = test::call_service(&app, test::TestRequest::get().uri(&verify_uri).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let status: Value = test::read_body_json(resp).await;
  assert_eq!(status["settlement"], "already_paid");
  assert!(market.store.order(order_id).await.unwrap().unwrap().paid);
  assert_eq!(market.store.product(tote).await.unwrap().unwrap().stock_quantity, 3);
  assert!(market.store.cart_items(market.buyer.id).await.unwrap().is_empty());
}

#[actix_rt::test]
#[serial]
async fn webhook_with_bad_signature_is_rejected_and_changes_nothing() {
  let (market, _, _) = market_with_cart().await;
  let app = test_app!(market.state);

  let body: Value = test::read_body_json(test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await).await;
  let reference = body["reference"].as_str().unwrap().to_string();
  let event = charge_event("charge.success", &reference, "success", 619_000);

  let forged = "ab".repeat(64);
  let resp = test::call_service(&app, webhook(&event, Some(&forged)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  let error: Value = test::read_body_json(resp).await;
  assert_eq!(error, json!({ "error": "Unauthorized" }));

  let resp = test::call_service(&app, webhook(&event, None).to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  // Signed with a different secret.
  let other = bazaar::signature::WebhookVerifier::new("sk_test_someone_else").sign(event.as_bytes());
  let resp = test::call_service(&app, webhook(&event, Some(&other)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let payment = market.store.payment(&reference).await.unwrap().unwrap();
  assert_eq!(payment.status, PaymentStatus::Pending);
  assert!(!market.store.cart_items(market.buyer.id).await.unwrap().is_empty());
}

#[actix_rt::test]
#[serial]
async fn failed_charge_is_terminal() {
  let (market, tote, _) = market_with_cart().await;
  let app = test_app!(market.state);

  let body: Value = test::read_body_json(test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await).await;
  let reference = body["reference"].as_str().unwrap().to_string();

  let failed = charge_event("charge.failed", &reference, "failed", 619_000);
  let sig = market.state.verifier.sign(failed.as_bytes());
  let ack: Value = test::read_body_json(test::call_service(&app, webhook(&failed, Some(&sig)).to_request()).await).await;
  assert_eq!(ack["settlement"], json!({ "applied": "failed" }));

  let late = charge_event("charge.success", &reference, "success", 619_000);
  let sig = market.state.verifier.sign(late.as_bytes());
  let ack: Value = test::read_body_json(test::call_service(&app, webhook(&late, Some(&sig)).to_request()).await).await;
  assert_eq!(ack["settlement"], "already_failed");

  let payment = market.store.payment(&reference).await.unwrap().unwrap();
  assert_eq!(payment.status, PaymentStatus::Failed);
  assert_eq!(market.store.product(tote).await.unwrap().unwrap().stock_quantity, 5);
}

#[actix_rt::test]
#[serial]
async fn unrelated_and_unknown_events_are_acknowledged() {
  let market = TestMarket::new().await;
  let app = test_app!(market.state);

  let transfer = json!({ "event": "transfer.success", "data": { "reference": "trf_1" } }).to_string();
  let sig = market.state.verifier.sign(transfer.as_bytes());
  let resp = test::call_service(&app, webhook(&transfer, Some(&sig)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let ack: Value = test::read_body_json(resp).await;
  assert_eq!(ack["status"], "ignored");

  let stray = charge_event("charge.success", "ord_unknown", "success", 1_000);
  let sig = market.state.verifier.sign(stray.as_bytes());
  let resp = test::call_service(&app, webhook(&stray, Some(&sig)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let ack: Value = test::read_body_json(resp).await;
  assert_eq!(ack["status"], "ignored");

  let garbage = "not json";
  let sig = market.state.verifier.sign(garbage.as_bytes());
  let resp = test::call_service(&app, webhook(garbage, Some(&sig)).to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
#[serial]
async fn verify_endpoint_settles_from_the_gateway() {
  let (market, tote, _) = market_with_cart().await;
  let app = test_app!(market.state);

  let body: Value = test::read_body_json(test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await).await;
  let reference = body["reference"].as_str().unwrap().to_string();
  let verify_uri = format!("/api/v1/payments/{}/verify", reference);

  // Not settled at the gateway yet.
  market.gateway.report(charge_report(&reference, "abandoned", 619_000));
  let resp = test::call_service(&app, test::TestRequest::get().uri(&verify_uri).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let status: Value = test::read_body_json(resp).await;
  assert_eq!(status["status"], "pending");
  assert_eq!(status["settlement"], "still_pending");

  market.gateway.report(charge_report(&reference, "success", 619_000));
  let status: Value =
    test::read_body_json(test::call_service(&app, test::TestRequest::get().uri(&verify_uri).to_request()).await).await;
  assert_eq!(status["status"], "paid");
  assert_eq!(status["settlement"], json!({ "applied": "paid" }));
  assert_eq!(market.store.product(tote).await.unwrap().unwrap().stock_quantity, 3);

  // Already paid: answered from the store.
  market.gateway.reports.lock().unwrap().clear();
  let status: Value =
    test::read_body_json(test::call_service(&app, test::TestRequest::get().uri(&verify_uri).to_request()).await).await;
  assert_eq!(status["status"], "paid");
  assert_eq!(status["settlement"], "already_paid");
}

#[actix_rt::test]
#[serial]
async fn amount_mismatch_is_a_conflict() {
  let (market, _, _) = market_with_cart().await;
  let app = test_app!(market.state);

  let body: Value = test::read_body_json(test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await).await;
  let reference = body["reference"].as_str().unwrap().to_string();

  market.gateway.report(charge_report(&reference, "success", 100));
  let uri = format!("/api/v1/payments/{}/verify", reference);
  let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);

  let payment = market.store.payment(&reference).await.unwrap().unwrap();
  assert_eq!(payment.status, PaymentStatus::Pending);
}

#[actix_rt::test]
#[serial]
async fn verifying_an_unknown_reference_is_not_found() {
  let market = TestMarket::new().await;
  let app = test_app!(market.state);
  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/payments/ord_nope/verify").to_request()).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
#[serial]
async fn gateway_outage_is_bad_gateway_and_keeps_the_cart() {
  let (market, _, _) = market_with_cart().await;
  market.gateway.refuse_initialize.store(true, Ordering::SeqCst);
  let app = test_app!(market.state);

  let resp = test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
  let error: Value = test::read_body_json(resp).await;
  assert_eq!(error["error"], "Payment gateway unavailable");
  assert_eq!(market.store.cart_items(market.buyer.id).await.unwrap().len(), 2);
}

#[actix_rt::test]
#[serial]
async fn checkout_validation_errors() {
  let market = TestMarket::new().await;
  let app = test_app!(market.state);

  let resp = test::call_service(&app, checkout(market.buyer.id, json!({})).to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "empty cart");

  let resp = test::call_service(&app, checkout(Uuid::new_v4(), json!({})).to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "unknown buyer");

  let resp = test::call_service(
    &app,
    test::TestRequest::post().uri("/api/v1/checkout").set_json(json!({})).to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "no identity");

  let vendor = market.vendor(Some("ACCT_A"), &market.growth, 20).await;
  let lamp = market.product(&vendor, "800.00", 1).await;
  let resp = test::call_service(&app, add_item(market.buyer.id, lamp.id, 1).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let delivery = json!({ "delivery": { "method": "delivery", "address": "  ", "phone": "0800" } });
  let resp = test::call_service(&app, checkout(market.buyer.id, delivery).to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "blank address");
  assert_eq!(market.gateway.initialize_count(), 0);
}

#[actix_rt::test]
#[serial]
async fn checkout_keeps_the_delivery_choice() {
  let (market, _, _) = market_with_cart().await;
  let app = test_app!(market.state);

  let delivery = json!({ "delivery": { "method": "delivery", "address": "12 Marina, Lagos", "phone": "08030000000" } });
  let body: Value = test::read_body_json(test::call_service(&app, checkout(market.buyer.id, delivery).to_request()).await).await;
  let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();

  let order = market.store.order(order_id).await.unwrap().unwrap();
  assert_eq!(
    order.delivery,
    Delivery::Delivery {
      address: "12 Marina, Lagos".to_string(),
      phone: "08030000000".to_string(),
    }
  );
  assert_eq!(order.total().unwrap(), Kobo(619_000));
}
