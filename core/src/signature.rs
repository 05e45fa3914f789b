// core/src/signature.rs

//! Webhook signature verification: hex-encoded HMAC-SHA512 of the raw request body,
//! keyed with the gateway secret.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::fmt;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

/// Header the gateway puts the signature in.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
  #[error("Signature header is missing")]
  Missing,

  #[error("Signature is not valid hex")]
  Malformed,

  #[error("Signature does not match the request body")]
  Mismatch,
}

#[derive(Clone)]
pub struct WebhookVerifier {
  secret: Vec<u8>,
}

impl fmt::Debug for WebhookVerifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WebhookVerifier").field("secret", &"[REDACTED]").finish()
  }
}

impl WebhookVerifier {
  pub fn new(secret: impl AsRef<[u8]>) -> Self {
    Self {
      secret: secret.as_ref().to_vec(),
    }
  }

  fn mac(&self) -> HmacSha512 {
    // HMAC accepts keys of any length, so this cannot fail.
    match HmacSha512::new_from_slice(&self.secret) {
      Ok(mac) => mac,
      Err(_) => unreachable!("HMAC-SHA512 accepts keys of any length"),
    }
  }

  /// Hex signature for `body`, as the gateway would send it.
  pub fn sign(&self, body: &[u8]) -> String {
    let mut mac = self.mac();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
  }

  /// Checks `signature` against `body` in constant time.
  pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
    let signature = signature.map(str::trim).filter(|s| !s.is_empty()).ok_or(SignatureError::Missing)?;
    let expected = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;

    let mut mac = self.mac();
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
  }
}
