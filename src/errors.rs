// src/errors.rs

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  /// The gateway answered the pay call with an error, or could not be
  /// reached. Carries the upstream HTTP status when one was received.
  #[error("Payment Gateway Error: {message}")]
  Gateway {
    message: String,
    upstream_status: Option<u16>,
  },

  /// Online payment was requested but the PhonePe credentials are not
  /// configured for this deployment.
  #[error("Payment Gateway Not Configured: {0}")]
  GatewayConfig(String),

  /// A gateway callback failed checksum verification.
  #[error("Callback Signature Rejected: {0}")]
  Signature(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

// Handlers occasionally call collaborators that report anyhow errors; fold
// those into the internal bucket rather than leaking their structure.
impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    AppError::Internal(err.to_string())
  }
}

impl ResponseError for AppError {
  fn error_response(&self) -> HttpResponse {
    // Log the full error when it's turned into a response.
    tracing::error!(application_error = %self, "Responding with error");
    match self {
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::Auth(m) => HttpResponse::Unauthorized().json(json!({"error": m})),
      AppError::NotFound(m) => HttpResponse::NotFound().json(json!({"error": m})),
      AppError::Gateway {
        message,
        upstream_status,
      } => HttpResponse::BadGateway().json(json!({
        "error": "Payment gateway error",
        "detail": message,
        "gatewayStatus": upstream_status,
      })),
      AppError::GatewayConfig(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "Payment gateway not configured", "detail": m}))
      }
      AppError::Signature(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::Config(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "Configuration issue", "detail": m}))
      }
      AppError::Sqlx(_) => HttpResponse::InternalServerError().json(json!({"error": "Database operation failed"})),
      AppError::Internal(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred", "detail": m}))
      }
    }
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
