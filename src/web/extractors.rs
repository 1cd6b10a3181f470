// src/web/extractors.rs

//! Request extractors for bearer-session authentication.

use crate::errors::AppError;
use crate::state::AppState;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

/// Resolved from the `Authorization: Bearer <token>` header against the
/// session and user stores. Handlers taking this parameter are
/// authenticated routes.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
  pub email: String,
  pub is_admin: bool,
  /// The session token the request authenticated with; signout revokes it.
  pub token: Uuid,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let req = req.clone();
    Box::pin(async move {
      let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("Application state not configured".to_string()))?;

      let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing Authorization header".to_string()))?;
      let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Authorization header must use the Bearer scheme".to_string()))?;
      let token = Uuid::parse_str(token.trim()).map_err(|_| AppError::Auth("Malformed session token".to_string()))?;

      let session = state
        .sessions
        .session_by_token(token)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid or expired session".to_string()))?;
      let user = state
        .users
        .user_by_id(session.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Session user no longer exists".to_string()))?;

      Ok(AuthenticatedUser {
        user_id: user.id,
        email: user.email,
        is_admin: user.is_admin,
        token,
      })
    })
  }
}

/// [`AuthenticatedUser`] plus an admin check. Admin accounts are flagged
/// directly in the users table; there is no self-service promotion.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl FromRequest for AdminUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let req = req.clone();
    Box::pin(async move {
      let user = AuthenticatedUser::from_request(&req, &mut Payload::None).await?;
      if !user.is_admin {
        return Err(AppError::Auth("Administrator access required".to_string()));
      }
      Ok(AdminUser(user))
    })
  }
}
