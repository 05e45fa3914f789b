// apps/marketplace/src/state.rs
use crate::config::AppConfig;
use crate::errors::AppError;
use bazaar::gateway::PaymentGateway;
use bazaar::signature::WebhookVerifier;
use bazaar::store::MarketStore;
use bazaar::Workflows;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn MarketStore>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub verifier: WebhookVerifier,
  pub workflows: Arc<Workflows<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Builds the state and registers every pipeline. The webhook secret is the
  /// gateway secret key.
  pub fn new(store: Arc<dyn MarketStore>, gateway: Arc<dyn PaymentGateway>, config: AppConfig) -> Self {
    let workflows = Arc::new(Workflows::new());
    crate::pipelines::register_all_pipelines(&workflows);
    Self {
      store,
      gateway,
      verifier: WebhookVerifier::new(config.paystack.secret_key.as_bytes()),
      workflows,
      config: Arc::new(config),
    }
  }
}
