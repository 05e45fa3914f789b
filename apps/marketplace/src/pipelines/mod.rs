// apps/marketplace/src/pipelines/mod.rs

//! The marketplace's operations, each composed as a `bazaar::Pipeline` over its
//! own context type.

use crate::errors::AppError;
use bazaar::Workflows;

pub mod common_steps;
pub mod contexts;

pub mod cart_pipeline;
pub mod checkout_pipeline;
pub mod payment_pipeline;
pub mod subscription_pipeline;
pub mod vendor_pipeline;
pub mod webhook_pipeline;

/// Registers every pipeline. Called once when the application state is built.
pub fn register_all_pipelines(workflows: &Workflows<AppError>) {
  tracing::info!("Registering pipelines...");

  cart_pipeline::register_cart_pipeline(workflows);
  checkout_pipeline::register_checkout_pipeline(workflows);
  payment_pipeline::register_verify_payment_pipeline(workflows);
  webhook_pipeline::register_webhook_pipeline(workflows);
  subscription_pipeline::register_plan_change_pipeline(workflows);
  subscription_pipeline::register_renewal_pipeline(workflows);
  vendor_pipeline::register_onboard_vendor_pipeline(workflows);
  vendor_pipeline::register_list_product_pipeline(workflows);

  tracing::info!("All pipelines registered.");
}
