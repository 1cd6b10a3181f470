// src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::Product;
use crate::state::AppState;
use crate::web::extractors::AdminUser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProductPayload {
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  pub price: Decimal,
  pub stock_quantity: i32,
}

#[instrument(name = "handler::list_products", skip(app_state))]
pub async fn list_products_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let products = app_state.products.list_products().await?;
  Ok(HttpResponse::Ok().json(products))
}

#[instrument(
    name = "handler::get_product",
    skip(app_state),
    fields(product_id = %product_id)
)]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  product_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product_id = product_id.into_inner();
  let product = app_state
    .products
    .product_by_id(product_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(
    name = "handler::create_product",
    skip(app_state, payload, admin),
    fields(admin_id = %admin.0.user_id, product_name = %payload.name)
)]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  payload: web::Json<NewProductPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  if payload.name.trim().is_empty() {
    return Err(AppError::Validation("Product name cannot be empty".to_string()));
  }
  if payload.price < Decimal::ZERO {
    return Err(AppError::Validation("Product price cannot be negative".to_string()));
  }
  if payload.stock_quantity < 0 {
    return Err(AppError::Validation("Stock quantity cannot be negative".to_string()));
  }

  let now = Utc::now();
  let product = Product {
    id: Uuid::new_v4(),
    name: payload.name,
    description: payload.description,
    price: payload.price,
    stock_quantity: payload.stock_quantity,
    created_at: now,
    updated_at: now,
  };
  app_state.products.insert_product(&product).await?;
  Ok(HttpResponse::Created().json(product))
}
