// src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::errors::AppError;
use crate::services::auth_service;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct SignupRequestPayload {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequestPayload {
  pub email: String,
  pub password: String,
}

#[instrument(
    name = "handler::signup",
    skip(app_state, payload),
    fields(email = %payload.email)
)]
pub async fn signup_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<SignupRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let user = auth_service::signup(app_state.users.as_ref(), &payload.email, &payload.password).await?;
  Ok(HttpResponse::Created().json(json!({ "id": user.id, "email": user.email })))
}

#[instrument(
    name = "handler::signin",
    skip(app_state, payload),
    fields(email = %payload.email)
)]
pub async fn signin_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<SigninRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let (session, user) = auth_service::signin(
    app_state.users.as_ref(),
    app_state.sessions.as_ref(),
    &payload.email,
    &payload.password,
  )
  .await?;
  Ok(HttpResponse::Ok().json(json!({ "token": session.token, "user": user })))
}

#[instrument(
    name = "handler::signout",
    skip(app_state, auth_user),
    fields(user_id = %auth_user.user_id)
)]
pub async fn signout_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  auth_service::signout(app_state.sessions.as_ref(), auth_user.token).await?;
  Ok(HttpResponse::NoContent().finish())
}
