// src/payments/phonepe.rs

use crate::config::PhonePeConfig;
use crate::errors::{AppError, Result};
use crate::payments::{checksum, GatewayClient, GatewayError, InitiatedPayment, PaymentInitiation};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const REDIRECT_MODE: &str = "REDIRECT";
const PAY_PAGE_INSTRUMENT: &str = "PAY_PAGE";

// Gateway-defined success markers for the callback triple.
const SUCCESS_CODE: &str = "PAYMENT_SUCCESS";
const SUCCESS_STATE: &str = "COMPLETED";
const SUCCESS_RESPONSE_CODE: &str = "SUCCESS";

/// Client for the PhonePe pay API. Holds no order state; one instance is
/// shared across requests.
pub struct PhonePeClient {
  http: reqwest::Client,
  config: PhonePeConfig,
}

impl PhonePeClient {
  /// Builds the client with the configured bounded timeout. A pay call that
  /// exceeds it surfaces as [`GatewayError::Unconfirmed`], never as a
  /// decline.
  pub fn new(config: PhonePeConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| AppError::Internal(format!("Failed to build gateway HTTP client: {}", e)))?;
    Ok(Self { http, config })
  }
}

#[async_trait]
impl GatewayClient for PhonePeClient {
  #[instrument(
    name = "phonepe::initiate",
    skip(self, request),
    fields(merchant_transaction_id = %request.merchant_transaction_id)
  )]
  async fn initiate(&self, request: &PaymentInitiation) -> Result<InitiatedPayment, GatewayError> {
    let amount = amount_paise(request.amount)?;
    let payload = PayRequest {
      merchant_id: &self.config.merchant_id,
      merchant_transaction_id: &request.merchant_transaction_id,
      merchant_user_id: request.user_id.simple().to_string(),
      amount,
      redirect_url: append_transaction_id(&self.config.redirect_url, &request.merchant_transaction_id),
      redirect_mode: REDIRECT_MODE,
      callback_url: &self.config.callback_url,
      mobile_number: normalize_mobile(&request.mobile),
      payment_instrument: PaymentInstrument {
        kind: PAY_PAGE_INSTRUMENT,
      },
    };

    let payload_json = serde_json::to_vec(&payload)
      .map_err(|e| GatewayError::Request(format!("Failed to encode pay payload: {}", e)))?;
    let payload_base64 = BASE64.encode(payload_json);
    let x_verify = checksum::sign(&payload_base64, &self.config.salt_key, &self.config.salt_index);

    let response = self
      .http
      .post(&self.config.pay_url)
      .header("X-VERIFY", x_verify)
      .json(&serde_json::json!({ "request": payload_base64 }))
      .send()
      .await
      .map_err(|e| GatewayError::Unconfirmed {
        message: format!("Pay call did not complete: {}", e),
      })?;

    let http_status = response.status();
    let body = response.text().await.map_err(|e| GatewayError::Unconfirmed {
      message: format!("Failed to read gateway response: {}", e),
    })?;
    debug!(status = %http_status, "Received pay API response");

    // A 5xx says nothing about the payment; the callback settles it later.
    if http_status.is_server_error() {
      return Err(GatewayError::Unconfirmed {
        message: format!("Gateway unavailable (HTTP {})", http_status.as_u16()),
      });
    }

    match serde_json::from_str::<PayResponse>(&body) {
      Ok(parsed) if parsed.success => match parsed.redirect_url() {
        Some(url) => Ok(InitiatedPayment { redirect_url: url }),
        None => Err(GatewayError::Unconfirmed {
          message: "Gateway reported success without a redirect URL".to_string(),
        }),
      },
      Ok(parsed) => Err(GatewayError::Declined {
        message: if parsed.message.is_empty() {
          parsed.code
        } else {
          parsed.message
        },
        http_status: Some(http_status.as_u16()),
      }),
      Err(_) if http_status.is_client_error() => Err(GatewayError::Declined {
        message: format!("Gateway rejected the pay call (HTTP {})", http_status.as_u16()),
        http_status: Some(http_status.as_u16()),
      }),
      Err(parse_err) => Err(GatewayError::Unconfirmed {
        message: format!("Unreadable gateway response (HTTP {}): {}", http_status.as_u16(), parse_err),
      }),
    }
  }
}

/// Converts a major-unit amount to paise. The total must be representable as
/// an exact whole number of paise; anything else never leaves the process.
fn amount_paise(amount: Decimal) -> Result<i64, GatewayError> {
  // checked_mul: a plain `*` panics when the product leaves Decimal's range.
  let paise = amount.checked_mul(Decimal::ONE_HUNDRED).ok_or_else(|| {
    GatewayError::Request(format!("Amount {} does not fit the gateway amount field", amount))
  })?;
  if paise.fract() != Decimal::ZERO {
    return Err(GatewayError::Request(format!(
      "Amount {} is not an exact paise value",
      amount
    )));
  }
  paise.to_i64().ok_or_else(|| {
    GatewayError::Request(format!("Amount {} does not fit the gateway amount field", amount))
  })
}

/// Keeps the last 10 digits of the given phone number, dropping separators
/// and any country prefix.
fn normalize_mobile(raw: &str) -> String {
  let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
  let start = digits.len().saturating_sub(10);
  digits[start..].to_string()
}

/// Appends the merchant transaction id to the configured redirect URL so the
/// client can resume the flow after the hosted page returns.
fn append_transaction_id(base: &str, merchant_transaction_id: &str) -> String {
  let separator = if base.contains('?') { '&' } else { '?' };
  format!("{}{}transactionId={}", base, separator, merchant_transaction_id)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayRequest<'a> {
  merchant_id: &'a str,
  merchant_transaction_id: &'a str,
  merchant_user_id: String,
  /// Paise.
  amount: i64,
  redirect_url: String,
  redirect_mode: &'a str,
  callback_url: &'a str,
  mobile_number: String,
  payment_instrument: PaymentInstrument<'a>,
}

#[derive(Debug, Serialize)]
struct PaymentInstrument<'a> {
  #[serde(rename = "type")]
  kind: &'a str,
}

// Reply to the pay call. Every field is defaulted so a sparse body still
// parses and gets classified instead of erroring.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayResponse {
  #[serde(default)]
  success: bool,
  #[serde(default)]
  code: String,
  #[serde(default)]
  message: String,
  #[serde(default)]
  data: Option<PayResponseData>,
}

impl PayResponse {
  fn redirect_url(self) -> Option<String> {
    self
      .data?
      .instrument_response?
      .redirect_info
      .map(|info| info.url)
      .filter(|url| !url.is_empty())
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayResponseData {
  #[serde(default)]
  instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
  #[serde(default)]
  redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedirectInfo {
  #[serde(default)]
  url: String,
}

/// Decoded server-to-server callback body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackEnvelope {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub code: String,
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub data: CallbackData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackData {
  #[serde(default)]
  pub merchant_id: String,
  #[serde(default)]
  pub merchant_transaction_id: String,
  #[serde(default)]
  pub transaction_id: String,
  /// Paise.
  #[serde(default)]
  pub amount: Option<i64>,
  #[serde(default)]
  pub state: String,
  #[serde(default)]
  pub response_code: String,
}

impl CallbackEnvelope {
  /// The gateway's defined success combination; all four markers must agree.
  pub fn is_payment_success(&self) -> bool {
    self.success
      && self.code == SUCCESS_CODE
      && self.data.state == SUCCESS_STATE
      && self.data.response_code == SUCCESS_RESPONSE_CODE
  }
}

/// Decodes the base64 `response` field of a callback body. The checksum must
/// already have been verified; this only decodes.
pub fn decode_callback(payload_base64: &str) -> Result<CallbackEnvelope> {
  let bytes = BASE64
    .decode(payload_base64)
    .map_err(|e| AppError::Validation(format!("Callback payload is not valid base64: {}", e)))?;
  serde_json::from_slice(&bytes)
    .map_err(|e| AppError::Validation(format!("Callback payload is not valid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn amount_conversion_requires_exact_paise() {
    assert_eq!(amount_paise(dec!(500.00)).unwrap(), 50000);
    assert_eq!(amount_paise(dec!(0.01)).unwrap(), 1);
    assert!(matches!(amount_paise(dec!(10.005)), Err(GatewayError::Request(_))));
  }

  #[test]
  fn amount_conversion_rejects_totals_beyond_the_paise_range() {
    // Times 100 overflows Decimal itself; must come back as an error.
    assert!(matches!(amount_paise(Decimal::MAX), Err(GatewayError::Request(_))));
    // Fits Decimal but not the gateway's i64 paise field.
    assert!(matches!(
      amount_paise(dec!(92233720368547758.08)),
      Err(GatewayError::Request(_))
    ));
  }

  #[test]
  fn mobile_number_keeps_last_ten_digits() {
    assert_eq!(normalize_mobile("+91 98765 43210"), "9876543210");
    // The trunk prefix is part of the dropped excess, same as a country code.
    assert_eq!(normalize_mobile("098-7654-3210"), "9876543210");
    assert_eq!(normalize_mobile("43210"), "43210");
  }

  #[test]
  fn redirect_url_gets_the_transaction_id_query_param() {
    assert_eq!(
      append_transaction_id("https://shop.example/return", "MT_1"),
      "https://shop.example/return?transactionId=MT_1"
    );
    assert_eq!(
      append_transaction_id("https://shop.example/return?src=app", "MT_1"),
      "https://shop.example/return?src=app&transactionId=MT_1"
    );
  }

  #[test]
  fn pay_request_serializes_with_gateway_field_names() {
    let payload = PayRequest {
      merchant_id: "MERCHANT",
      merchant_transaction_id: "MT_1",
      merchant_user_id: "u1".to_string(),
      amount: 50000,
      redirect_url: "https://shop.example/return?transactionId=MT_1".to_string(),
      redirect_mode: REDIRECT_MODE,
      callback_url: "https://shop.example/api/v1/payments/callback",
      mobile_number: "9876543210".to_string(),
      payment_instrument: PaymentInstrument {
        kind: PAY_PAGE_INSTRUMENT,
      },
    };
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["merchantId"], "MERCHANT");
    assert_eq!(json["merchantTransactionId"], "MT_1");
    assert_eq!(json["amount"], 50000);
    assert_eq!(json["redirectMode"], "REDIRECT");
    assert_eq!(json["paymentInstrument"]["type"], "PAY_PAGE");
  }

  #[test]
  fn pay_response_extracts_the_hosted_page_url() {
    let body = r#"{
      "success": true,
      "code": "PAYMENT_INITIATED",
      "data": {
        "instrumentResponse": {
          "redirectInfo": { "url": "https://pay.example/page/123" }
        }
      }
    }"#;
    let parsed: PayResponse = serde_json::from_str(body).unwrap();
    assert!(parsed.success);
    assert_eq!(parsed.redirect_url().as_deref(), Some("https://pay.example/page/123"));
  }

  #[test]
  fn sparse_pay_response_still_parses() {
    let parsed: PayResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
    assert!(!parsed.success);
    assert!(parsed.redirect_url().is_none());
  }

  fn success_envelope() -> CallbackEnvelope {
    CallbackEnvelope {
      success: true,
      code: SUCCESS_CODE.to_string(),
      message: String::new(),
      data: CallbackData {
        merchant_id: "MERCHANT".to_string(),
        merchant_transaction_id: "MT_1".to_string(),
        transaction_id: "T999".to_string(),
        amount: Some(50000),
        state: SUCCESS_STATE.to_string(),
        response_code: SUCCESS_RESPONSE_CODE.to_string(),
      },
    }
  }

  #[test]
  fn success_triple_requires_every_marker() {
    assert!(success_envelope().is_payment_success());

    let mut e = success_envelope();
    e.success = false;
    assert!(!e.is_payment_success());

    let mut e = success_envelope();
    e.code = "PAYMENT_ERROR".to_string();
    assert!(!e.is_payment_success());

    let mut e = success_envelope();
    e.data.state = "FAILED".to_string();
    assert!(!e.is_payment_success());

    let mut e = success_envelope();
    e.data.response_code = "ZU".to_string();
    assert!(!e.is_payment_success());
  }

  #[test]
  fn callback_decoding_round_trips_through_base64() {
    let body = r#"{
      "success": true,
      "code": "PAYMENT_SUCCESS",
      "data": {
        "merchantTransactionId": "MT_1",
        "transactionId": "T999",
        "amount": 50000,
        "state": "COMPLETED",
        "responseCode": "SUCCESS"
      }
    }"#;
    let encoded = BASE64.encode(body);
    let envelope = decode_callback(&encoded).unwrap();
    assert!(envelope.is_payment_success());
    assert_eq!(envelope.data.merchant_transaction_id, "MT_1");
    assert_eq!(envelope.data.amount, Some(50000));
  }

  #[test]
  fn callback_decoding_rejects_bad_base64_and_bad_json() {
    assert!(decode_callback("not-base64!!!").is_err());
    assert!(decode_callback(&BASE64.encode(b"{not json")).is_err());
  }
}
