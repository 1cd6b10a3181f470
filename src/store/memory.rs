// src/store/memory.rs

use crate::errors::{AppError, Result};
use crate::models::{CartItem, Order, OrderStatus, Product, Session, User};
use crate::store::{CartStore, FinalizeOutcome, OrderStore, PaymentResolution, ProductStore, SessionStore, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Thread-safe in-memory adapter for every store trait.
///
/// Backed by `Arc<RwLock<HashMap>>` maps, so clones share state. Used by the
/// test suites and by runs without a database; it enforces the same
/// uniqueness rules the Postgres schema does.
#[derive(Default, Clone)]
pub struct MemoryStore {
  users: Arc<RwLock<HashMap<Uuid, User>>>,
  sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
  products: Arc<RwLock<HashMap<Uuid, Product>>>,
  cart_items: Arc<RwLock<HashMap<(Uuid, Uuid), CartItem>>>,
  orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl UserStore for MemoryStore {
  async fn insert_user(&self, user: &User) -> Result<()> {
    let mut users = self.users.write().await;
    if users.values().any(|u| u.email == user.email) {
      return Err(AppError::Validation(format!("Email '{}' is already registered", user.email)));
    }
    users.insert(user.id, user.clone());
    Ok(())
  }

  async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
    let users = self.users.read().await;
    Ok(users.values().find(|u| u.email == email).cloned())
  }

  async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
    let users = self.users.read().await;
    Ok(users.get(&id).cloned())
  }
}

#[async_trait]
impl SessionStore for MemoryStore {
  async fn insert_session(&self, session: &Session) -> Result<()> {
    let mut sessions = self.sessions.write().await;
    sessions.insert(session.token, session.clone());
    Ok(())
  }

  async fn session_by_token(&self, token: Uuid) -> Result<Option<Session>> {
    let sessions = self.sessions.read().await;
    Ok(sessions.get(&token).cloned())
  }

  async fn delete_session(&self, token: Uuid) -> Result<()> {
    let mut sessions = self.sessions.write().await;
    sessions.remove(&token);
    Ok(())
  }
}

#[async_trait]
impl ProductStore for MemoryStore {
  async fn insert_product(&self, product: &Product) -> Result<()> {
    let mut products = self.products.write().await;
    products.insert(product.id, product.clone());
    Ok(())
  }

  async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>> {
    let products = self.products.read().await;
    Ok(products.get(&id).cloned())
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let products = self.products.read().await;
    let mut all: Vec<Product> = products.values().cloned().collect();
    all.sort_by_key(|p| p.created_at);
    Ok(all)
  }
}

#[async_trait]
impl CartStore for MemoryStore {
  async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem> {
    let mut cart = self.cart_items.write().await;
    let entry = cart.entry((user_id, product_id)).or_insert_with(|| CartItem {
      id: Uuid::new_v4(),
      user_id,
      product_id,
      quantity: 0,
      added_at: Utc::now(),
    });
    entry.quantity += quantity;
    Ok(entry.clone())
  }

  async fn cart_for_user(&self, user_id: Uuid) -> Result<Vec<CartItem>> {
    let cart = self.cart_items.read().await;
    let mut items: Vec<CartItem> = cart.values().filter(|c| c.user_id == user_id).cloned().collect();
    items.sort_by_key(|c| c.added_at);
    Ok(items)
  }

  async fn remove_from_cart(&self, user_id: Uuid, product_id: Uuid) -> Result<()> {
    let mut cart = self.cart_items.write().await;
    cart.remove(&(user_id, product_id));
    Ok(())
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn insert_order(&self, order: &Order) -> Result<()> {
    let mut orders = self.orders.write().await;
    if let Some(mtid) = order.merchant_transaction_id.as_deref() {
      if orders
        .values()
        .any(|o| o.merchant_transaction_id.as_deref() == Some(mtid))
      {
        return Err(AppError::Validation(format!(
          "Merchant transaction id '{}' already exists",
          mtid
        )));
      }
    }
    orders.insert(order.id, order.clone());
    Ok(())
  }

  async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
    let orders = self.orders.read().await;
    Ok(orders.get(&id).cloned())
  }

  async fn order_by_merchant_txn(&self, merchant_transaction_id: &str) -> Result<Option<Order>> {
    let orders = self.orders.read().await;
    Ok(
      orders
        .values()
        .find(|o| o.merchant_transaction_id.as_deref() == Some(merchant_transaction_id))
        .cloned(),
    )
  }

  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    let orders = self.orders.read().await;
    let mut own: Vec<Order> = orders.values().filter(|o| o.user_id == user_id).cloned().collect();
    own.sort_by_key(|o| o.created_at);
    own.reverse();
    Ok(own)
  }

  async fn update_fulfillment(&self, order_id: Uuid, status: OrderStatus) -> Result<Option<Order>> {
    let mut orders = self.orders.write().await;
    Ok(orders.get_mut(&order_id).map(|order| {
      order.status = status;
      order.updated_at = Utc::now();
      order.clone()
    }))
  }

  // The whole check-and-write happens under one write guard, which is what
  // makes racing finalizers observe each other.
  async fn finalize_payment(
    &self,
    merchant_transaction_id: &str,
    resolution: PaymentResolution,
  ) -> Result<FinalizeOutcome> {
    let mut orders = self.orders.write().await;
    let order = orders
      .values_mut()
      .find(|o| o.merchant_transaction_id.as_deref() == Some(merchant_transaction_id));

    let Some(order) = order else {
      return Ok(FinalizeOutcome::NotFound);
    };
    if order.payment_status.is_final() {
      return Ok(FinalizeOutcome::AlreadyFinal(order.clone()));
    }

    order.payment_status = resolution.payment_status;
    order.status = resolution.order_status;
    if resolution.gateway_transaction_id.is_some() {
      order.gateway_transaction_id = resolution.gateway_transaction_id;
    }
    order.updated_at = Utc::now();
    Ok(FinalizeOutcome::Applied(order.clone()))
  }
}
