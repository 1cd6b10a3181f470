// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Opaque bearer session handed out at sign-in. The token doubles as the
/// primary key, so possession of the token is the whole credential.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub token: Uuid,
  pub user_id: Uuid,
  pub created_at: DateTime<Utc>,
}
