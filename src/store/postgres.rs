// src/store/postgres.rs

use crate::errors::{AppError, Result};
use crate::models::{
  CartItem, Order, OrderItem, OrderStatus, PaymentGateway, PaymentMethod, PaymentStatus, Product,
  Session, ShippingAddress, User,
};
use crate::store::{CartStore, FinalizeOutcome, OrderStore, PaymentResolution, ProductStore, SessionStore, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

/// Postgres adapter for every store trait. Schema lives in `schema.sql`.
#[derive(Clone)]
pub struct PostgresStore {
  pool: PgPool,
}

impl PostgresStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn items_for_orders(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
    if order_ids.is_empty() {
      return Ok(HashMap::new());
    }
    let items = sqlx::query_as::<_, OrderItem>(
      "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY line_no",
    )
    .bind(order_ids)
    .fetch_all(&self.pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
      grouped.entry(item.order_id).or_default().push(item);
    }
    Ok(grouped)
  }

  async fn assemble(&self, row: OrderRow) -> Result<Order> {
    let order_id = row.id;
    let mut items = self.items_for_orders(&[order_id]).await?;
    Ok(row.into_order(items.remove(&order_id).unwrap_or_default()))
  }
}

// Flat orders row; line items are loaded separately and zipped in.
#[derive(FromRow)]
struct OrderRow {
  id: Uuid,
  user_id: Uuid,
  shipping_address: Json<ShippingAddress>,
  payment_method: PaymentMethod,
  payment_gateway: PaymentGateway,
  shipping_charge: Decimal,
  total: Decimal,
  merchant_transaction_id: Option<String>,
  gateway_transaction_id: Option<String>,
  payment_status: PaymentStatus,
  status: OrderStatus,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl OrderRow {
  fn into_order(self, items: Vec<OrderItem>) -> Order {
    Order {
      id: self.id,
      user_id: self.user_id,
      items,
      shipping_address: self.shipping_address.0,
      payment_method: self.payment_method,
      payment_gateway: self.payment_gateway,
      shipping_charge: self.shipping_charge,
      total: self.total,
      merchant_transaction_id: self.merchant_transaction_id,
      gateway_transaction_id: self.gateway_transaction_id,
      payment_status: self.payment_status,
      status: self.status,
      created_at: self.created_at,
      updated_at: self.updated_at,
    }
  }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
  matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl UserStore for PostgresStore {
  async fn insert_user(&self, user: &User) -> Result<()> {
    sqlx::query(
      "INSERT INTO users (id, email, password_hash, is_admin, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_admin)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&self.pool)
    .await
    .map_err(|e| {
      if is_unique_violation(&e) {
        AppError::Validation(format!("Email '{}' is already registered", user.email))
      } else {
        AppError::from(e)
      }
    })?;
    Ok(())
  }

  async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
      .bind(email)
      .fetch_optional(&self.pool)
      .await?;
    Ok(user)
  }

  async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(user)
  }
}

#[async_trait]
impl SessionStore for PostgresStore {
  async fn insert_session(&self, session: &Session) -> Result<()> {
    sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES ($1, $2, $3)")
      .bind(session.token)
      .bind(session.user_id)
      .bind(session.created_at)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn session_by_token(&self, token: Uuid) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token = $1")
      .bind(token)
      .fetch_optional(&self.pool)
      .await?;
    Ok(session)
  }

  async fn delete_session(&self, token: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
      .bind(token)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}

#[async_trait]
impl ProductStore for PostgresStore {
  async fn insert_product(&self, product: &Product) -> Result<()> {
    sqlx::query(
      "INSERT INTO products (id, name, description, price, stock_quantity, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.stock_quantity)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(product)
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at")
      .fetch_all(&self.pool)
      .await?;
    Ok(products)
  }
}

#[async_trait]
impl CartStore for PostgresStore {
  async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem> {
    let item = sqlx::query_as::<_, CartItem>(
      "INSERT INTO cart_items (id, user_id, product_id, quantity, added_at) \
       VALUES ($1, $2, $3, $4, NOW()) \
       ON CONFLICT (user_id, product_id) \
       DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
       RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(&self.pool)
    .await?;
    Ok(item)
  }

  async fn cart_for_user(&self, user_id: Uuid) -> Result<Vec<CartItem>> {
    let items = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE user_id = $1 ORDER BY added_at")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;
    Ok(items)
  }

  async fn remove_from_cart(&self, user_id: Uuid, product_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
      .bind(user_id)
      .bind(product_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}

#[async_trait]
impl OrderStore for PostgresStore {
  async fn insert_order(&self, order: &Order) -> Result<()> {
    let mut tx = self.pool.begin().await?;

    sqlx::query(
      "INSERT INTO orders (id, user_id, shipping_address, payment_method, payment_gateway, \
       shipping_charge, total, merchant_transaction_id, gateway_transaction_id, \
       payment_status, status, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(Json(&order.shipping_address))
    .bind(order.payment_method)
    .bind(order.payment_gateway)
    .bind(order.shipping_charge)
    .bind(order.total)
    .bind(&order.merchant_transaction_id)
    .bind(&order.gateway_transaction_id)
    .bind(order.payment_status)
    .bind(order.status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
      if is_unique_violation(&e) {
        if let Some(mtid) = order.merchant_transaction_id.as_deref() {
          return AppError::Validation(format!("Merchant transaction id '{}' already exists", mtid));
        }
      }
      AppError::from(e)
    })?;

    // line_no keeps the draft's item sequence; UUID keys carry no order.
    for (line_no, item) in order.items.iter().enumerate() {
      sqlx::query(
        "INSERT INTO order_items (id, order_id, line_no, product_id, quantity, unit_price) \
         VALUES ($1, $2, $3, $4, $5, $6)",
      )
      .bind(item.id)
      .bind(item.order_id)
      .bind(line_no as i32)
      .bind(item.product_id)
      .bind(item.quantity)
      .bind(item.unit_price)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    match row {
      Some(row) => Ok(Some(self.assemble(row).await?)),
      None => Ok(None),
    }
  }

  async fn order_by_merchant_txn(&self, merchant_transaction_id: &str) -> Result<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE merchant_transaction_id = $1")
      .bind(merchant_transaction_id)
      .fetch_optional(&self.pool)
      .await?;
    match row {
      Some(row) => Ok(Some(self.assemble(row).await?)),
      None => Ok(None),
    }
  }

  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut items = self.items_for_orders(&ids).await?;
    Ok(
      rows
        .into_iter()
        .map(|row| {
          let own = items.remove(&row.id).unwrap_or_default();
          row.into_order(own)
        })
        .collect(),
    )
  }

  async fn update_fulfillment(&self, order_id: Uuid, status: OrderStatus) -> Result<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(
      "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order_id)
    .bind(status)
    .fetch_optional(&self.pool)
    .await?;
    match row {
      Some(row) => Ok(Some(self.assemble(row).await?)),
      None => Ok(None),
    }
  }

  // The WHERE clause is the idempotency gate: only a row still in `pending`
  // matches, so concurrent finalizers cannot both update it.
  async fn finalize_payment(
    &self,
    merchant_transaction_id: &str,
    resolution: PaymentResolution,
  ) -> Result<FinalizeOutcome> {
    let updated = sqlx::query_as::<_, OrderRow>(
      "UPDATE orders \
       SET payment_status = $2, status = $3, \
           gateway_transaction_id = COALESCE($4, gateway_transaction_id), \
           updated_at = NOW() \
       WHERE merchant_transaction_id = $1 AND payment_status = $5 \
       RETURNING *",
    )
    .bind(merchant_transaction_id)
    .bind(resolution.payment_status)
    .bind(resolution.order_status)
    .bind(&resolution.gateway_transaction_id)
    .bind(PaymentStatus::Pending)
    .fetch_optional(&self.pool)
    .await?;

    if let Some(row) = updated {
      return Ok(FinalizeOutcome::Applied(self.assemble(row).await?));
    }

    // No pending row matched: either the order is already final or the
    // transaction id is unknown.
    match self.order_by_merchant_txn(merchant_transaction_id).await? {
      Some(order) => Ok(FinalizeOutcome::AlreadyFinal(order)),
      None => Ok(FinalizeOutcome::NotFound),
    }
  }
}
