// core/src/gateway/paystack.rs

//! Paystack-compatible REST client.
//!
//! Responses are wrapped in `{"status": bool, "message": str, "data": ...}`. A non-2xx
//! answer, `status: false`, or a body that does not parse are all surfaced as
//! [`GatewayError`] and returned to the caller as-is; the client does not retry.

use super::{Authorization, ChargeReport, GatewayError, InitializeRequest, PaymentGateway};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

#[derive(Clone)]
pub struct PaystackConfig {
  pub base_url: String,
  pub secret_key: String,
  pub timeout: Duration,
}

impl PaystackConfig {
  pub fn new(secret_key: impl Into<String>) -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      secret_key: secret_key.into(),
      timeout: Duration::from_secs(15),
    }
  }
}

impl fmt::Debug for PaystackConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PaystackConfig")
      .field("base_url", &self.base_url)
      .field("secret_key", &"[REDACTED]")
      .field("timeout", &self.timeout)
      .finish()
  }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
  status: bool,
  #[serde(default)]
  message: String,
  data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  message: String,
}

#[derive(Clone)]
pub struct PaystackClient {
  client: Client,
  base_url: String,
  secret_key: String,
}

impl fmt::Debug for PaystackClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PaystackClient").field("base_url", &self.base_url).finish_non_exhaustive()
  }
}

impl PaystackClient {
  pub fn new(config: &PaystackConfig) -> Result<Self, GatewayError> {
    if config.secret_key.trim().is_empty() {
      return Err(GatewayError::Rejected("secret key is empty".to_string()));
    }
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| GatewayError::Transport(e.to_string()))?;

    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      secret_key: config.secret_key.clone(),
    })
  }

  async fn read_envelope<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, GatewayError> {
    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| GatewayError::Transport(e.to_string()))?;

    if status != StatusCode::OK && status != StatusCode::CREATED {
      let message = serde_json::from_slice::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
      warn!(status = status.as_u16(), %message, "Gateway returned a non-success status.");
      return Err(GatewayError::Status {
        status: status.as_u16(),
        message,
      });
    }

    let envelope: Envelope<T> =
      serde_json::from_slice(&body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
    if !envelope.status {
      return Err(GatewayError::Rejected(envelope.message));
    }
    envelope
      .data
      .ok_or_else(|| GatewayError::Malformed("response has no data".to_string()))
  }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
  #[instrument(name = "paystack::initialize", skip(self, request), fields(reference = %request.reference, amount = request.amount.value()), err(Display))]
  async fn initialize(&self, request: &InitializeRequest) -> Result<Authorization, GatewayError> {
    debug!(split = request.split.is_some(), "Initializing transaction.");
    let response = self
      .client
      .post(format!("{}/transaction/initialize", self.base_url))
      .bearer_auth(&self.secret_key)
      .json(request)
      .send()
      .await
      .map_err(|e| GatewayError::Transport(e.to_string()))?;

    self.read_envelope::<Authorization>(response).await
  }

  #[instrument(name = "paystack::verify", skip(self), err(Display))]
  async fn verify(&self, reference: &str) -> Result<ChargeReport, GatewayError> {
    let response = self
      .client
      .get(format!("{}/transaction/verify/{}", self.base_url, reference))
      .bearer_auth(&self.secret_key)
      .send()
      .await
      .map_err(|e| GatewayError::Transport(e.to_string()))?;

    let data = self.read_envelope::<JsonValue>(response).await?;
    ChargeReport::from_transaction(data)
  }
}
