// src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::errors::AppError;
use crate::payments::{checksum, phonepe};
use crate::services::order_service::CallbackOutcome;
use crate::state::AppState;

const VERIFY_HEADER: &str = "X-VERIFY";

// Outer callback body; the interesting part is base64 inside `response`.
#[derive(Debug, Deserialize)]
struct CallbackBody {
  response: String,
}

/// Server-to-server PhonePe callback.
///
/// The gateway expects a plain-text acknowledgment, so this handler never
/// goes through the JSON error path: every exit is an explicit 200, 400 or
/// 500. A 500 invites the gateway to retry; everything processed, including
/// "unknown transaction" and "already final", acknowledges with 200.
#[instrument(
    name = "handler::phonepe_callback",
    skip(app_state, req, body),
    fields(payload_size = body.len())
)]
pub async fn phonepe_callback_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> HttpResponse {
  let Some(phonepe_config) = app_state.config.phonepe.as_ref() else {
    error!("Received a gateway callback but PhonePe is not configured");
    return HttpResponse::InternalServerError().body("gateway not configured");
  };

  let Ok(parsed) = serde_json::from_slice::<CallbackBody>(&body) else {
    warn!("Callback body missing the base64 response field");
    return HttpResponse::BadRequest().body("invalid callback body");
  };

  let received_checksum = req
    .headers()
    .get(VERIFY_HEADER)
    .and_then(|value| value.to_str().ok());
  let Some(received_checksum) = received_checksum else {
    warn!("Callback arrived without an X-VERIFY header");
    return HttpResponse::BadRequest().body("missing signature header");
  };

  // Signature first; the payload is not even parsed until it passes.
  if !checksum::verify(
    &parsed.response,
    received_checksum,
    &phonepe_config.salt_key,
    &phonepe_config.salt_index,
  ) {
    let rejection = AppError::Signature("X-VERIFY does not match the payload".to_string());
    warn!(error = %rejection, "Rejecting gateway callback");
    return HttpResponse::BadRequest().body("signature verification failed");
  }

  let envelope = match phonepe::decode_callback(&parsed.response) {
    Ok(envelope) => envelope,
    Err(err) => {
      warn!(error = %err, "Callback payload failed to decode");
      return HttpResponse::BadRequest().body("undecodable callback payload");
    }
  };

  match app_state.orders.reconcile_callback(envelope).await {
    Ok(CallbackOutcome::Finalized(order)) => {
      info!(
        order_id = %order.id,
        payment_status = ?order.payment_status,
        status = ?order.status,
        "Callback finalized the payment"
      );
      HttpResponse::Ok().body("ok")
    }
    Ok(CallbackOutcome::AlreadyFinal) => {
      info!("Callback for an already-final payment; nothing to do");
      HttpResponse::Ok().body("ok")
    }
    Ok(CallbackOutcome::UnknownTransaction) => HttpResponse::Ok().body("unknown transaction"),
    Ok(CallbackOutcome::MissingTransactionId) => HttpResponse::Ok().body("missing transaction id"),
    Err(err) => {
      error!(error = %err, "Callback processing failed; asking the gateway to retry");
      HttpResponse::InternalServerError().body("processing failed")
    }
  }
}
