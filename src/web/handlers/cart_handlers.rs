// src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartPayload {
  pub product_id: Uuid,
  pub quantity: i32,
}

#[instrument(
    name = "handler::add_to_cart",
    skip(app_state, payload, auth_user),
    fields(user_id = %auth_user.user_id, product_id = %payload.product_id, quantity = %payload.quantity)
)]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<AddToCartPayload>,
) -> Result<HttpResponse, AppError> {
  if payload.quantity < 1 {
    return Err(AppError::Validation("Quantity must be at least 1".to_string()));
  }

  let product = app_state
    .products
    .product_by_id(payload.product_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {} not found", payload.product_id)))?;
  if product.stock_quantity < payload.quantity {
    return Err(AppError::Validation(format!(
      "Only {} of '{}' left in stock",
      product.stock_quantity, product.name
    )));
  }

  let item = app_state
    .carts
    .add_to_cart(auth_user.user_id, payload.product_id, payload.quantity)
    .await?;
  Ok(HttpResponse::Ok().json(item))
}

#[instrument(
    name = "handler::view_cart",
    skip(app_state, auth_user),
    fields(user_id = %auth_user.user_id)
)]
pub async fn view_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let items = app_state.carts.cart_for_user(auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(items))
}

#[instrument(
    name = "handler::remove_from_cart",
    skip(app_state, auth_user),
    fields(user_id = %auth_user.user_id, product_id = %product_id)
)]
pub async fn remove_from_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  product_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  app_state
    .carts
    .remove_from_cart(auth_user.user_id, product_id.into_inner())
    .await?;
  Ok(HttpResponse::NoContent().finish())
}
