// apps/marketplace/tests/cart_tests.rs

#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use bazaar::store::{CartStore, CatalogStore};
use common::TestMarket;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

fn as_buyer(req: test::TestRequest, user_id: Uuid) -> test::TestRequest {
  req.insert_header(("X-User-ID", user_id.to_string()))
}

#[actix_rt::test]
#[serial]
async fn adding_twice_accumulates_quantity() {
  let market = TestMarket::new().await;
  let vendor = market.vendor(Some("ACCT_A"), &market.growth, 20).await;
  let tote = market.product(&vendor, "2500.00", 5).await;
  let app = test_app!(market.state);

  for _ in 0..2 {
    let req = as_buyer(test::TestRequest::post().uri("/api/v1/cart/items"), market.buyer.id)
      .set_json(json!({ "product_id": tote.id, "quantity": 2 }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  let items = market.store.cart_items(market.buyer.id).await.unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].quantity, 4);

  // A fifth and sixth would exceed the five in stock.
  let req = as_buyer(test::TestRequest::post().uri("/api/v1/cart/items"), market.buyer.id)
    .set_json(json!({ "product_id": tote.id, "quantity": 2 }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(market.store.cart_items(market.buyer.id).await.unwrap()[0].quantity, 4);
}

#[actix_rt::test]
#[serial]
async fn cart_view_prices_lines_in_kobo() {
  let market = TestMarket::new().await;
  let vendor = market.vendor(Some("ACCT_A"), &market.growth, 20).await;
  let tote = market.product(&vendor, "2500.50", 5).await;
  let pen = market.product(&vendor, "99.99", 10).await;
  market.store.set_cart_quantity(market.buyer.id, tote.id, 2).await.unwrap();
  market.store.set_cart_quantity(market.buyer.id, pen.id, 3).await.unwrap();
  let app = test_app!(market.state);

  let req = as_buyer(test::TestRequest::get().uri("/api/v1/cart"), market.buyer.id).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let summary: Value = test::read_body_json(resp).await;

  assert_eq!(summary["lines"].as_array().unwrap().len(), 2);
  assert_eq!(summary["lines"][0]["line_total"], 500_100);
  assert_eq!(summary["lines"][1]["line_total"], 29_997);
  assert_eq!(summary["subtotal"], 530_097);
}

#[actix_rt::test]
#[serial]
async fn setting_zero_removes_and_delete_of_missing_item_is_not_found() {
  let market = TestMarket::new().await;
  let vendor = market.vendor(Some("ACCT_A"), &market.growth, 20).await;
  let tote = market.product(&vendor, "2500.00", 5).await;
  market.store.set_cart_quantity(market.buyer.id, tote.id, 2).await.unwrap();
  let app = test_app!(market.state);
  let uri = format!("/api/v1/cart/items/{}", tote.id);

  let req = as_buyer(test::TestRequest::put().uri(&uri), market.buyer.id)
    .set_json(json!({ "quantity": 3 }))
    .to_request();
  let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(body["item"]["quantity"], 3);

  let req = as_buyer(test::TestRequest::put().uri(&uri), market.buyer.id)
    .set_json(json!({ "quantity": 0 }))
    .to_request();
  let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(body["removed"], true);
  assert!(market.store.cart_items(market.buyer.id).await.unwrap().is_empty());

  let req = as_buyer(test::TestRequest::delete().uri(&uri), market.buyer.id).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
#[serial]
async fn invalid_cart_changes_are_rejected() {
  let market = TestMarket::new().await;
  let vendor = market.vendor(Some("ACCT_A"), &market.growth, 20).await;
  let tote = market.product(&vendor, "2500.00", 5).await;
  let app = test_app!(market.state);

  let req = as_buyer(test::TestRequest::post().uri("/api/v1/cart/items"), market.buyer.id)
    .set_json(json!({ "product_id": tote.id, "quantity": 0 }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

  let req = as_buyer(test::TestRequest::post().uri("/api/v1/cart/items"), market.buyer.id)
    .set_json(json!({ "product_id": Uuid::new_v4(), "quantity": 1 }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

  let req = test::TestRequest::post()
    .uri("/api/v1/cart/items")
    .insert_header(("X-User-ID", "not-a-uuid"))
    .set_json(json!({ "product_id": tote.id, "quantity": 1 }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
#[serial]
async fn products_are_listed_and_fetched() {
  let market = TestMarket::new().await;
  let vendor = market.vendor(Some("ACCT_A"), &market.growth, 20).await;
  let tote = market.product(&vendor, "2500.00", 5).await;
  let mut retired = tote.clone();
  retired.id = Uuid::new_v4();
  retired.active = false;
  market.store.insert_product(&retired).await.unwrap();
  let app = test_app!(market.state);

  let body: Value = test::read_body_json(
    test::call_service(&app, test::TestRequest::get().uri("/api/v1/products").to_request()).await,
  )
  .await;
  let ids: Vec<String> = body["products"]
    .as_array()
    .unwrap()
    .iter()
    .map(|p| p["id"].as_str().unwrap().to_string())
    .collect();
  assert_eq!(ids, vec![tote.id.to_string()]);

  let uri = format!("/api/v1/products/{}", tote.id);
  let body: Value = test::read_body_json(test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await).await;
  assert_eq!(body["product"]["unit_price"], "2500.00");

  let uri = format!("/api/v1/products/{}", Uuid::new_v4());
  let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
}
