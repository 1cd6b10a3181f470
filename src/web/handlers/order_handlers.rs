// src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::OrderDraft;
use crate::state::AppState;
use crate::web::extractors::{AdminUser, AuthenticatedUser};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
  pub status: String,
}

#[instrument(
    name = "handler::create_order",
    skip(app_state, draft, auth_user),
    fields(user_id = %auth_user.user_id)
)]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  draft: web::Json<OrderDraft>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .orders
    .create_cash_order(auth_user.user_id, &auth_user.email, draft.into_inner())
    .await?;
  Ok(HttpResponse::Created().json(order))
}

#[instrument(
    name = "handler::initiate_payment",
    skip(app_state, draft, auth_user),
    fields(user_id = %auth_user.user_id)
)]
pub async fn initiate_payment_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  draft: web::Json<OrderDraft>,
) -> Result<HttpResponse, AppError> {
  let receipt = app_state
    .orders
    .initiate_online_payment(auth_user.user_id, draft.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(receipt))
}

#[instrument(
    name = "handler::list_my_orders",
    skip(app_state, auth_user),
    fields(user_id = %auth_user.user_id)
)]
pub async fn list_my_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.orders.list_orders_for_user(auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(
    name = "handler::get_order",
    skip(app_state, auth_user),
    fields(user_id = %auth_user.user_id, order_id = %order_id)
)]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = order_id.into_inner();
  let order = app_state.orders.get_order(order_id).await?;
  // Another user's order reads as absent, not as forbidden.
  if order.user_id != auth_user.user_id && !auth_user.is_admin {
    return Err(AppError::NotFound(format!("Order {} not found", order_id)));
  }
  Ok(HttpResponse::Ok().json(order))
}

/// No session required: the frontend polls this straight after the gateway
/// redirect, before it has re-established one. The unguessable merchant
/// transaction id is the only lookup key.
#[instrument(
    name = "handler::status_by_transaction",
    skip(app_state),
    fields(merchant_transaction_id = %merchant_transaction_id)
)]
pub async fn status_by_transaction_handler(
  app_state: web::Data<AppState>,
  merchant_transaction_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let view = app_state
    .orders
    .payment_status_by_txn(&merchant_transaction_id)
    .await?;
  Ok(HttpResponse::Ok().json(view))
}

#[instrument(
    name = "handler::update_order_status",
    skip(app_state, admin, payload),
    fields(admin_id = %admin.0.user_id, order_id = %order_id, new_status = %payload.status)
)]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  order_id: web::Path<Uuid>,
  payload: web::Json<UpdateStatusPayload>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .orders
    .update_fulfillment_status(order_id.into_inner(), &payload.status)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}
