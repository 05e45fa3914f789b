// apps/marketplace/src/config.rs

use crate::errors::{AppError, Result};
use bazaar::gateway::PaystackConfig;
use bazaar::subscription::{SubscriptionPolicy, DEFAULT_CYCLE_DAYS, DEFAULT_GRACE_DAYS, DEFAULT_TRIAL_DAYS};
use bazaar::{FeeSchedule, Kobo};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub app_base_url: String,
  pub paystack: PaystackConfig,
  pub fees: FeeSchedule,
  pub subscription: SubscriptionPolicy,
  pub run_migrations: bool,
  pub log_format: LogFormat,
}

impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_url", &"[REDACTED]")
      .field("app_base_url", &self.app_base_url)
      .field("paystack", &self.paystack)
      .field("fees", &self.fees)
      .field("subscription", &self.subscription)
      .field("run_migrations", &self.run_migrations)
      .field("log_format", &self.log_format)
      .finish()
  }
}

fn get_env(var_name: &str) -> Result<String> {
  env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
}

/// Reads `var_name`, falling back to `default` when unset, and parses it.
fn parse_env<T>(var_name: &str, default: &str) -> Result<T>
where
  T: FromStr,
  T::Err: fmt::Display,
{
  let raw = get_env(var_name).unwrap_or_else(|_| default.to_string());
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", var_name, raw, e)))
}

fn naira_env(var_name: &str, default: &str) -> Result<Kobo> {
  let amount: Decimal = parse_env(var_name, default)?;
  Kobo::from_naira(amount).map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e)))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port: u16 = parse_env("SERVER_PORT", "8080")?;
    let database_url = get_env("DATABASE_URL")?;
    let app_base_url = get_env("APP_BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port));

    let secret_key = get_env("PAYSTACK_SECRET_KEY")?;
    if secret_key.trim().is_empty() {
      return Err(AppError::Config("PAYSTACK_SECRET_KEY is empty".to_string()));
    }
    let mut paystack = PaystackConfig::new(secret_key);
    if let Ok(base_url) = get_env("PAYSTACK_BASE_URL") {
      paystack.base_url = base_url;
    }
    paystack.timeout = Duration::from_secs(parse_env("GATEWAY_TIMEOUT_SECS", "15")?);

    let fees = FeeSchedule {
      percent: parse_env("PLATFORM_FEE_PERCENT", "1.5")?,
      fixed: naira_env("PLATFORM_FIXED_FEE", "100")?,
      cap: naira_env("PLATFORM_FEE_CAP", "2000")?,
    };
    if fees.percent.is_sign_negative() {
      return Err(AppError::Config("PLATFORM_FEE_PERCENT must not be negative".to_string()));
    }

    let subscription = SubscriptionPolicy::new(
      parse_env("SUBSCRIPTION_CYCLE_DAYS", &DEFAULT_CYCLE_DAYS.to_string())?,
      parse_env("SUBSCRIPTION_TRIAL_DAYS", &DEFAULT_TRIAL_DAYS.to_string())?,
      parse_env("SUBSCRIPTION_GRACE_DAYS", &DEFAULT_GRACE_DAYS.to_string())?,
    )
    .map_err(|e| AppError::Config(e.to_string()))?;

    let run_migrations: bool = parse_env("RUN_MIGRATIONS", "false")?;
    let log_format = match get_env("LOG_FORMAT").unwrap_or_default().to_ascii_lowercase().as_str() {
      "json" => LogFormat::Json,
      "" | "pretty" => LogFormat::Pretty,
      other => return Err(AppError::Config(format!("Invalid LOG_FORMAT '{}'", other))),
    };

    Ok(Self {
      server_host,
      server_port,
      database_url,
      app_base_url: app_base_url.trim_end_matches('/').to_string(),
      paystack,
      fees,
      subscription,
      run_migrations,
      log_format,
    })
  }

  /// Where the gateway sends the buyer after paying for `reference`.
  pub fn callback_url(&self, reference: &str) -> String {
    format!("{}/api/v1/payments/{}/verify", self.app_base_url, reference)
  }
}
