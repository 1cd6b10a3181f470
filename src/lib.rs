// src/lib.rs

//! Storefront backend: products, carts, user accounts, and order placement
//! with a PhonePe payment integration.
//!
//! The interesting part lives in [`services::order_service`]: an order moves
//! through a small payment state machine that is driven by the synchronous
//! gateway response and by asynchronous server-to-server callbacks, and every
//! payment-state write goes through a conditional store operation so that
//! retried or racing callbacks reconcile idempotently.

pub mod config;
pub mod errors;
pub mod models;
pub mod payments;
pub mod services;
pub mod state;
pub mod store;
pub mod web;

pub use crate::config::AppConfig;
pub use crate::errors::{AppError, Result};
pub use crate::state::AppState;
