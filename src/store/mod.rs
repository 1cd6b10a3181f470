// src/store/mod.rs

//! Storage ports. Services and handlers depend on these traits only;
//! adapters live in [`memory`] (tests and ephemeral runs) and [`postgres`]
//! (production).

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{CartItem, Order, OrderStatus, PaymentStatus, Product, Session, User};
use async_trait::async_trait;
use uuid::Uuid;

/// Final values written by a payment transition.
#[derive(Debug, Clone)]
pub struct PaymentResolution {
  pub payment_status: PaymentStatus,
  pub order_status: OrderStatus,
  /// Persisted when present; an existing value is never overwritten with
  /// `None`.
  pub gateway_transaction_id: Option<String>,
}

/// Result of the conditional payment finalize. Exactly one caller can move
/// an order out of `Pending`; every other caller observes the already-final
/// row or nothing.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
  /// This call performed the transition.
  Applied(Order),
  /// The order exists but its payment was already final.
  AlreadyFinal(Order),
  NotFound,
}

#[async_trait]
pub trait UserStore: Send + Sync {
  async fn insert_user(&self, user: &User) -> Result<()>;
  async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
  async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn insert_session(&self, session: &Session) -> Result<()>;
  async fn session_by_token(&self, token: Uuid) -> Result<Option<Session>>;
  async fn delete_session(&self, token: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
  async fn insert_product(&self, product: &Product) -> Result<()>;
  async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>>;
  async fn list_products(&self) -> Result<Vec<Product>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
  /// Inserts the item or accumulates `quantity` into the existing
  /// (user, product) row. Returns the row as stored.
  async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem>;
  async fn cart_for_user(&self, user_id: Uuid) -> Result<Vec<CartItem>>;
  async fn remove_from_cart(&self, user_id: Uuid, product_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  async fn insert_order(&self, order: &Order) -> Result<()>;
  async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>>;
  async fn order_by_merchant_txn(&self, merchant_transaction_id: &str) -> Result<Option<Order>>;
  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;

  /// Unconditional fulfilment-status update (admin path); payment fields are
  /// untouched. Returns `None` when the order does not exist.
  async fn update_fulfillment(&self, order_id: Uuid, status: OrderStatus) -> Result<Option<Order>>;

  /// The one write that moves an order out of `payment_status = Pending`.
  /// Check and write are a single atomic step in every adapter; a caller
  /// that lost the race gets `AlreadyFinal` with the winning row.
  async fn finalize_payment(
    &self,
    merchant_transaction_id: &str,
    resolution: PaymentResolution,
  ) -> Result<FinalizeOutcome>;
}
