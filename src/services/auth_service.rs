// src/services/auth_service.rs

//! Password hashing, session issuance, and the signup/signin/signout flows.

use crate::errors::{AppError, Result};
use crate::models::{Session, User};
use crate::store::{SessionStore, UserStore};
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use chrono::Utc;
use tracing::{debug, error, instrument};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

/// Hashes a plain-text password using Argon2 with a random salt.
#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String> {
  if password.is_empty() {
    return Err(AppError::Validation("Password cannot be empty".to_string()));
  }

  let salt = SaltString::generate(&mut OsRng);
  match Argon2::default().hash_password(password.as_bytes(), &salt) {
    Ok(hash) => Ok(hash.to_string()),
    Err(argon_err) => {
      error!(error = %argon_err, "Argon2 password hashing failed.");
      Err(AppError::Internal(format!("Password hashing failed: {}", argon_err)))
    }
  }
}

/// Verifies a plain-text password against a stored Argon2 hash. `Ok(false)`
/// means the password simply does not match; errors mean the stored hash is
/// unusable.
#[instrument(name = "auth_service::verify_password", skip(stored_hash, provided_password))]
pub fn verify_password(stored_hash: &str, provided_password: &str) -> Result<bool> {
  let parsed_hash = PasswordHash::new(stored_hash).map_err(|parse_err| {
    error!(error = %parse_err, "Failed to parse stored password hash.");
    AppError::Internal(format!("Invalid stored password hash: {}", parse_err))
  })?;

  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => Ok(false),
    Err(other) => {
      error!(error = %other, "Argon2 verification errored.");
      Err(AppError::Internal(format!("Password verification failed: {}", other)))
    }
  }
}

/// Registers a new account. Email uniqueness is enforced by the store, so a
/// racing duplicate signup loses there rather than here.
#[instrument(name = "auth_service::signup", skip(users, password), fields(email = %email))]
pub async fn signup(users: &dyn UserStore, email: &str, password: &str) -> Result<User> {
  let email = email.trim().to_lowercase();
  if email.is_empty() || !email.contains('@') {
    return Err(AppError::Validation("A valid email address is required".to_string()));
  }
  if password.len() < MIN_PASSWORD_LEN {
    return Err(AppError::Validation(format!(
      "Password must be at least {} characters",
      MIN_PASSWORD_LEN
    )));
  }

  let now = Utc::now();
  let user = User {
    id: Uuid::new_v4(),
    email,
    password_hash: hash_password(password)?,
    is_admin: false,
    created_at: now,
    updated_at: now,
  };
  users.insert_user(&user).await?;
  debug!(user_id = %user.id, "User registered.");
  Ok(user)
}

/// Checks credentials and issues a fresh session. The error is identical for
/// an unknown email and a wrong password.
#[instrument(name = "auth_service::signin", skip(users, sessions, password), fields(email = %email))]
pub async fn signin(
  users: &dyn UserStore,
  sessions: &dyn SessionStore,
  email: &str,
  password: &str,
) -> Result<(Session, User)> {
  let email = email.trim().to_lowercase();
  let invalid = || AppError::Auth("Invalid email or password".to_string());

  let user = users.user_by_email(&email).await?.ok_or_else(invalid)?;
  if !verify_password(&user.password_hash, password)? {
    return Err(invalid());
  }

  let session = Session {
    token: Uuid::new_v4(),
    user_id: user.id,
    created_at: Utc::now(),
  };
  sessions.insert_session(&session).await?;
  debug!(user_id = %user.id, "Session issued.");
  Ok((session, user))
}

/// Revokes a session. Deleting an already-deleted token is a no-op.
#[instrument(name = "auth_service::signout", skip(sessions))]
pub async fn signout(sessions: &dyn SessionStore, token: Uuid) -> Result<()> {
  sessions.delete_session(token).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::memory::MemoryStore;

  #[test]
  fn hash_then_verify_round_trips() {
    let hash = hash_password("correct horse battery").unwrap();
    assert!(verify_password(&hash, "correct horse battery").unwrap());
    assert!(!verify_password(&hash, "wrong password").unwrap());
  }

  #[test]
  fn empty_password_is_rejected() {
    assert!(hash_password("").is_err());
  }

  #[tokio::test]
  async fn signup_then_signin_issues_a_session() {
    let store = MemoryStore::new();
    let user = signup(&store, "Asha@Example.com", "s3cret-enough").await.unwrap();
    // Emails are stored lowercased.
    assert_eq!(user.email, "asha@example.com");

    let (session, signed_in) = signin(&store, &store, "asha@example.com", "s3cret-enough")
      .await
      .unwrap();
    assert_eq!(session.user_id, user.id);
    assert_eq!(signed_in.id, user.id);
  }

  #[tokio::test]
  async fn signin_rejects_wrong_password_and_unknown_email() {
    let store = MemoryStore::new();
    signup(&store, "asha@example.com", "s3cret-enough").await.unwrap();

    let wrong = signin(&store, &store, "asha@example.com", "nope-nope-nope").await;
    assert!(matches!(wrong, Err(AppError::Auth(_))));

    let unknown = signin(&store, &store, "ravi@example.com", "s3cret-enough").await;
    assert!(matches!(unknown, Err(AppError::Auth(_))));
  }

  #[tokio::test]
  async fn short_password_is_rejected_at_signup() {
    let store = MemoryStore::new();
    let err = signup(&store, "asha@example.com", "short").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
  }
}
