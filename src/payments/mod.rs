// src/payments/mod.rs

//! PhonePe integration: checksum codec, merchant transaction ids, and the
//! pay-API client. Everything here is stateless; order state is owned by
//! `services::order_service`.

pub mod checksum;
pub mod phonepe;
pub mod txn_id;

use crate::errors::AppError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Everything the gateway needs to start a payment, detached from the order
/// aggregate so the client never touches order state.
#[derive(Debug, Clone)]
pub struct PaymentInitiation {
  pub merchant_transaction_id: String,
  pub user_id: Uuid,
  /// Major currency units; converted to paise at the gateway edge.
  pub amount: Decimal,
  /// Raw phone number as entered; normalized before it is sent.
  pub mobile: String,
}

#[derive(Debug, Clone)]
pub struct InitiatedPayment {
  /// Hosted payment page the customer is sent to.
  pub redirect_url: String,
}

/// How an initiate attempt failed. `Declined` is an answer from the gateway;
/// `Unconfirmed` is the absence of one and must never be treated as a
/// refusal, because the money may still be in flight.
#[derive(Debug, Error)]
pub enum GatewayError {
  /// Rejected locally before any network traffic happened.
  #[error("gateway request not sent: {0}")]
  Request(String),

  /// The gateway answered and refused the payment.
  #[error("gateway declined: {message}")]
  Declined {
    message: String,
    http_status: Option<u16>,
  },

  /// Timeout, transport failure, HTTP 5xx or an unreadable reply. The
  /// outcome of this attempt is unknown; only the callback can settle it.
  #[error("gateway outcome unconfirmed: {message}")]
  Unconfirmed { message: String },
}

impl From<GatewayError> for AppError {
  fn from(err: GatewayError) -> Self {
    match err {
      GatewayError::Request(m) => AppError::Validation(m),
      GatewayError::Declined {
        message,
        http_status,
      } => AppError::Gateway {
        message,
        upstream_status: http_status,
      },
      GatewayError::Unconfirmed { message } => AppError::Gateway {
        message,
        upstream_status: None,
      },
    }
  }
}

/// Seam for injecting a scripted gateway in tests. Exactly one production
/// implementation exists ([`phonepe::PhonePeClient`]).
#[async_trait]
pub trait GatewayClient: Send + Sync {
  async fn initiate(&self, request: &PaymentInitiation) -> Result<InitiatedPayment, GatewayError>;
}
