// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

use storefront_api::config::{AppConfig, PhonePeConfig};
use storefront_api::models::{OrderDraft, OrderItemDraft, Session, ShippingAddress, User};
use storefront_api::payments::phonepe::CallbackEnvelope;
use storefront_api::payments::{
  checksum, phonepe, GatewayClient, GatewayError, InitiatedPayment, PaymentInitiation,
};
use storefront_api::services::notifications::{Notification, NotificationSink, Notifier, RetryConfig};
use storefront_api::services::order_service::OrderService;
use storefront_api::store::memory::MemoryStore;

pub const SALT_KEY: &str = "4a2e9bc7-test-salt-key";
pub const SALT_INDEX: &str = "1";
pub const MERCHANT_ID: &str = "MERCHANT_TEST";

// --- Tracing setup (call once per test) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Scripted gateway ---

#[derive(Debug, Clone)]
pub enum GatewayScript {
  Succeed { redirect_url: String },
  Decline { message: String },
  Unconfirmed { message: String },
}

/// Gateway double whose next answer is set by the test.
pub struct ScriptedGateway {
  script: Mutex<GatewayScript>,
  pub calls: AtomicUsize,
}

impl ScriptedGateway {
  pub fn succeeding(redirect_url: &str) -> Self {
    Self {
      script: Mutex::new(GatewayScript::Succeed {
        redirect_url: redirect_url.to_string(),
      }),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn set(&self, script: GatewayScript) {
    *self.script.lock().unwrap() = script;
  }

  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl GatewayClient for ScriptedGateway {
  async fn initiate(&self, _request: &PaymentInitiation) -> Result<InitiatedPayment, GatewayError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match &*self.script.lock().unwrap() {
      GatewayScript::Succeed { redirect_url } => Ok(InitiatedPayment {
        redirect_url: redirect_url.clone(),
      }),
      GatewayScript::Decline { message } => Err(GatewayError::Declined {
        message: message.clone(),
        http_status: Some(400),
      }),
      GatewayScript::Unconfirmed { message } => Err(GatewayError::Unconfirmed {
        message: message.clone(),
      }),
    }
  }
}

// --- Recording notification sink ---

#[derive(Default)]
pub struct CountingSink {
  delivered: Mutex<Vec<Notification>>,
}

impl CountingSink {
  pub fn total(&self) -> usize {
    self.delivered.lock().unwrap().len()
  }

  pub fn confirmations(&self) -> Vec<(String, Uuid)> {
    self
      .delivered
      .lock()
      .unwrap()
      .iter()
      .filter_map(|n| match n {
        Notification::OrderConfirmation {
          recipient, order_id, ..
        } => Some((recipient.clone(), *order_id)),
        _ => None,
      })
      .collect()
  }

  pub fn admin_alerts(&self) -> usize {
    self
      .delivered
      .lock()
      .unwrap()
      .iter()
      .filter(|n| matches!(n, Notification::AdminOrderAlert { .. }))
      .count()
  }
}

#[async_trait]
impl NotificationSink for CountingSink {
  async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
    self.delivered.lock().unwrap().push(notification.clone());
    Ok(())
  }
}

// --- Harness wiring the service against in-memory adapters ---

pub struct TestHarness {
  pub store: MemoryStore,
  pub gateway: Arc<ScriptedGateway>,
  pub sink: Arc<CountingSink>,
  pub orders: Arc<OrderService>,
}

pub fn fast_retry() -> RetryConfig {
  RetryConfig {
    max_attempts: 2,
    initial_delay: Duration::from_millis(5),
    max_delay: Duration::from_millis(20),
    multiplier: 2.0,
  }
}

pub fn harness() -> TestHarness {
  setup_tracing();
  let store = MemoryStore::new();
  let gateway = Arc::new(ScriptedGateway::succeeding("https://pay.invalid/page/1"));
  let sink = Arc::new(CountingSink::default());
  let notifier = Notifier::spawn(sink.clone(), fast_retry());
  let orders = Arc::new(OrderService::new(
    Arc::new(store.clone()),
    Arc::new(store.clone()),
    Some(gateway.clone()),
    notifier,
  ));
  TestHarness {
    store,
    gateway,
    sink,
    orders,
  }
}

pub fn harness_without_gateway() -> TestHarness {
  setup_tracing();
  let store = MemoryStore::new();
  // Never called; present so the struct shape stays the same.
  let gateway = Arc::new(ScriptedGateway::succeeding("https://pay.invalid/unused"));
  let sink = Arc::new(CountingSink::default());
  let notifier = Notifier::spawn(sink.clone(), fast_retry());
  let orders = Arc::new(OrderService::new(
    Arc::new(store.clone()),
    Arc::new(store.clone()),
    None,
    notifier,
  ));
  TestHarness {
    store,
    gateway,
    sink,
    orders,
  }
}

// --- Fixtures ---

pub fn test_address() -> ShippingAddress {
  ShippingAddress {
    name: "Asha Rao".to_string(),
    phone: "+91 98765 43210".to_string(),
    address_line1: "12 MG Road".to_string(),
    address_line2: None,
    city: "Bengaluru".to_string(),
    state: "Karnataka".to_string(),
    postal_code: "560001".to_string(),
  }
}

/// Single-line draft whose total trivially satisfies the creation invariant.
pub fn draft_with_total(total: Decimal) -> OrderDraft {
  OrderDraft {
    items: vec![OrderItemDraft {
      product_id: Uuid::new_v4(),
      quantity: 1,
      unit_price: total,
    }],
    shipping_address: test_address(),
    shipping_charge: Decimal::ZERO,
    total,
  }
}

pub async fn seed_user(store: &MemoryStore, email: &str, is_admin: bool) -> User {
  use storefront_api::store::UserStore;
  let now = Utc::now();
  let user = User {
    id: Uuid::new_v4(),
    email: email.to_string(),
    password_hash: "$argon2-not-checked-here".to_string(),
    is_admin,
    created_at: now,
    updated_at: now,
  };
  store.insert_user(&user).await.unwrap();
  user
}

/// Bypasses the signin flow; hands back a bearer token for `user_id`.
pub async fn seed_session(store: &MemoryStore, user_id: Uuid) -> Uuid {
  use storefront_api::store::SessionStore;
  let session = Session {
    token: Uuid::new_v4(),
    user_id,
    created_at: Utc::now(),
  };
  store.insert_session(&session).await.unwrap();
  session.token
}

/// Config with the PhonePe group present, matching the test salt.
pub fn app_config_with_gateway() -> AppConfig {
  AppConfig {
    server_host: "127.0.0.1".to_string(),
    server_port: 0,
    database_url: "postgres://unused".to_string(),
    admin_email: "ops@example.com".to_string(),
    email_sender: "orders@example.com".to_string(),
    phonepe: Some(PhonePeConfig {
      merchant_id: MERCHANT_ID.to_string(),
      salt_key: SALT_KEY.to_string(),
      salt_index: SALT_INDEX.to_string(),
      pay_url: "https://gateway.invalid/pg/v1/pay".to_string(),
      redirect_url: "https://shop.invalid/payment/return".to_string(),
      callback_url: "https://shop.invalid/api/v1/payments/callback".to_string(),
      timeout: Duration::from_secs(5),
    }),
  }
}

// --- Callback builders ---

pub fn success_callback_json(merchant_transaction_id: &str, amount_paise: i64) -> serde_json::Value {
  json!({
    "success": true,
    "code": "PAYMENT_SUCCESS",
    "message": "Your payment is successful.",
    "data": {
      "merchantId": MERCHANT_ID,
      "merchantTransactionId": merchant_transaction_id,
      "transactionId": "T2408281440",
      "amount": amount_paise,
      "state": "COMPLETED",
      "responseCode": "SUCCESS"
    }
  })
}

pub fn failure_callback_json(merchant_transaction_id: &str) -> serde_json::Value {
  json!({
    "success": false,
    "code": "PAYMENT_ERROR",
    "message": "Payment declined by the bank.",
    "data": {
      "merchantId": MERCHANT_ID,
      "merchantTransactionId": merchant_transaction_id,
      "transactionId": "T2408281441",
      "state": "FAILED",
      "responseCode": "ZM"
    }
  })
}

pub fn encode_envelope(value: &serde_json::Value) -> String {
  BASE64.encode(value.to_string())
}

/// Parses a callback JSON value the way the handler would after decoding.
pub fn envelope_from(value: &serde_json::Value) -> CallbackEnvelope {
  phonepe::decode_callback(&encode_envelope(value)).unwrap()
}

/// Body and matching X-VERIFY header for an HTTP-level callback request.
pub fn signed_callback_request(value: &serde_json::Value) -> (String, String) {
  let encoded = encode_envelope(value);
  let x_verify = checksum::callback_checksum(&encoded, SALT_KEY, SALT_INDEX);
  let body = json!({ "response": encoded }).to_string();
  (body, x_verify)
}

/// Polls `condition` for up to `deadline_ms`, yielding between checks.
/// Notification delivery runs on a background task, so assertions on the
/// sink go through this.
pub async fn wait_until(deadline_ms: u64, condition: impl Fn() -> bool) -> bool {
  let rounds = (deadline_ms / 10).max(1);
  for _ in 0..rounds {
    if condition() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  condition()
}
