// src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;

const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,

  // Recipients for order notifications
  pub admin_email: String,
  pub email_sender: String,

  /// PhonePe credentials. `None` means this deployment takes cash orders only
  /// and the initiate-payment endpoint refuses to run.
  pub phonepe: Option<PhonePeConfig>,
}

#[derive(Clone)]
pub struct PhonePeConfig {
  pub merchant_id: String,
  pub salt_key: String,
  pub salt_index: String,
  pub pay_url: String,
  pub redirect_url: String,
  pub callback_url: String,
  pub timeout: Duration,
}

// The salt key must never reach logs, so Debug prints a placeholder for it.
impl fmt::Debug for PhonePeConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PhonePeConfig")
      .field("merchant_id", &self.merchant_id)
      .field("salt_key", &"[REDACTED]")
      .field("salt_index", &self.salt_index)
      .field("pay_url", &self.pay_url)
      .field("redirect_url", &self.redirect_url)
      .field("callback_url", &self.callback_url)
      .field("timeout", &self.timeout)
      .finish()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL")?;
    let admin_email = get_env("ADMIN_EMAIL")?;
    let email_sender = get_env("EMAIL_SENDER").unwrap_or_else(|_| "orders@example.com".to_string());

    let phonepe = PhonePeConfig::from_env()?;
    if phonepe.is_none() {
      tracing::warn!("PhonePe variables not set; online payment is disabled for this run.");
    }

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      admin_email,
      email_sender,
      phonepe,
    })
  }
}

impl PhonePeConfig {
  const REQUIRED_VARS: [&'static str; 6] = [
    "PHONEPE_MERCHANT_ID",
    "PHONEPE_SALT_KEY",
    "PHONEPE_SALT_INDEX",
    "PHONEPE_PAY_URL",
    "PHONEPE_REDIRECT_URL",
    "PHONEPE_CALLBACK_URL",
  ];

  /// The PhonePe variables are an all-or-nothing group. None set means the
  /// gateway is deliberately disabled; a partial set is a deployment mistake
  /// and refuses to boot.
  pub fn from_env() -> Result<Option<Self>> {
    let present: Vec<&str> = Self::REQUIRED_VARS
      .iter()
      .copied()
      .filter(|var| env::var(var).is_ok())
      .collect();

    if present.is_empty() {
      return Ok(None);
    }
    if present.len() < Self::REQUIRED_VARS.len() {
      let missing: Vec<&str> = Self::REQUIRED_VARS
        .iter()
        .copied()
        .filter(|var| env::var(var).is_err())
        .collect();
      return Err(AppError::Config(format!(
        "Incomplete PhonePe configuration; missing: {}",
        missing.join(", ")
      )));
    }

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };

    let timeout_secs = match env::var("PHONEPE_TIMEOUT_SECS") {
      Ok(raw) => raw
        .parse::<u64>()
        .map_err(|e| AppError::Config(format!("Invalid PHONEPE_TIMEOUT_SECS: {}", e)))?,
      Err(_) => DEFAULT_GATEWAY_TIMEOUT_SECS,
    };

    Ok(Some(Self {
      merchant_id: get_env("PHONEPE_MERCHANT_ID")?,
      salt_key: get_env("PHONEPE_SALT_KEY")?,
      salt_index: get_env("PHONEPE_SALT_INDEX")?,
      pay_url: get_env("PHONEPE_PAY_URL")?,
      redirect_url: get_env("PHONEPE_REDIRECT_URL")?,
      callback_url: get_env("PHONEPE_CALLBACK_URL")?,
      timeout: Duration::from_secs(timeout_secs),
    }))
  }
}
