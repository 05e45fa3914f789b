// apps/marketplace/src/web/routes.rs

use crate::web::handlers::{
  cart_handlers, checkout_handlers, payment_handlers, product_handlers, vendor_handlers, webhook_handlers,
};
use actix_web::web;

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/products")
          .route("", web::get().to(product_handlers::list_products_handler))
          .route("/{product_id}", web::get().to(product_handlers::get_product_handler)),
      )
      .service(
        web::scope("/cart")
          .route("", web::get().to(cart_handlers::view_cart_handler))
          .route("/items", web::post().to(cart_handlers::add_to_cart_handler))
          .route("/items/{product_id}", web::put().to(cart_handlers::set_cart_quantity_handler))
          .route("/items/{product_id}", web::delete().to(cart_handlers::remove_from_cart_handler)),
      )
      .route("/checkout", web::post().to(checkout_handlers::start_checkout_handler))
      .route(
        "/payments/{reference}/verify",
        web::get().to(payment_handlers::verify_payment_handler),
      )
      .route(
        "/webhooks/paystack",
        web::post().to(webhook_handlers::paystack_webhook_handler),
      )
      .service(
        web::scope("/vendors")
          .route("", web::post().to(vendor_handlers::onboard_vendor_handler))
          .route("/{vendor_id}/products", web::post().to(vendor_handlers::list_product_handler))
          .route("/{vendor_id}/plan", web::post().to(vendor_handlers::change_plan_handler))
          .route("/{vendor_id}/subscription", web::get().to(vendor_handlers::subscription_handler))
          .route(
            "/{vendor_id}/subscription/renew",
            web::post().to(vendor_handlers::renew_subscription_handler),
          ),
      ),
  );
}
