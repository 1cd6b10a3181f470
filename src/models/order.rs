// src/models/order.rs

use crate::errors::{AppError, Result};
use crate::models::order_item::{OrderItem, OrderItemDraft};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  Cod,
  Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_gateway", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
  None,
  Phonepe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  NotApplicable,
  Pending,
  Paid,
  Failed,
}

impl PaymentStatus {
  /// Only `Pending` can still transition; every other value is terminal.
  pub fn is_final(self) -> bool {
    !matches!(self, PaymentStatus::Pending)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  PaymentPending,
  Processing,
  Shipped,
  Delivered,
  Completed,
  Cancelled,
  PaymentFailed,
  /// Payment captured but the paid amount disagreed with the order total.
  /// Parked for manual resolution; no automated remedy.
  PaymentIssue,
}

impl OrderStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::PaymentPending => "payment_pending",
      OrderStatus::Processing => "processing",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Completed => "completed",
      OrderStatus::Cancelled => "cancelled",
      OrderStatus::PaymentFailed => "payment_failed",
      OrderStatus::PaymentIssue => "payment_issue",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "payment_pending" => Ok(OrderStatus::PaymentPending),
      "processing" => Ok(OrderStatus::Processing),
      "shipped" => Ok(OrderStatus::Shipped),
      "delivered" => Ok(OrderStatus::Delivered),
      "completed" => Ok(OrderStatus::Completed),
      "cancelled" => Ok(OrderStatus::Cancelled),
      "payment_failed" => Ok(OrderStatus::PaymentFailed),
      "payment_issue" => Ok(OrderStatus::PaymentIssue),
      other => Err(AppError::Validation(format!("Unknown order status '{}'", other))),
    }
  }
}

/// Destination for the shipment; immutable once the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
  pub name: String,
  pub phone: String,
  pub address_line1: String,
  #[serde(default)]
  pub address_line2: Option<String>,
  pub city: String,
  pub state: String,
  pub postal_code: String,
}

/// Client-submitted order body, shared by the cash and online flows.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
  pub items: Vec<OrderItemDraft>,
  pub shipping_address: ShippingAddress,
  #[serde(default)]
  pub shipping_charge: Decimal,
  pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub items: Vec<OrderItem>,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  pub payment_gateway: PaymentGateway,
  pub shipping_charge: Decimal,
  pub total: Decimal,
  /// Correlation key for gateway callbacks; `None` for cash orders.
  pub merchant_transaction_id: Option<String>,
  /// Assigned by the gateway; `None` until a response or callback supplies it.
  pub gateway_transaction_id: Option<String>,
  pub payment_status: PaymentStatus,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// Cash-on-delivery order: no gateway involvement, immediately in
  /// fulfilment.
  pub fn new_cash(user_id: Uuid, draft: OrderDraft) -> Result<Self> {
    Self::build(
      user_id,
      draft,
      PaymentMethod::Cod,
      PaymentGateway::None,
      None,
      PaymentStatus::NotApplicable,
      OrderStatus::Processing,
    )
  }

  /// Online order awaiting gateway confirmation. The caller supplies a fresh
  /// merchant transaction id; the callback later correlates on it.
  pub fn new_online(user_id: Uuid, draft: OrderDraft, merchant_transaction_id: String) -> Result<Self> {
    Self::build(
      user_id,
      draft,
      PaymentMethod::Online,
      PaymentGateway::Phonepe,
      Some(merchant_transaction_id),
      PaymentStatus::Pending,
      OrderStatus::PaymentPending,
    )
  }

  fn build(
    user_id: Uuid,
    draft: OrderDraft,
    payment_method: PaymentMethod,
    payment_gateway: PaymentGateway,
    merchant_transaction_id: Option<String>,
    payment_status: PaymentStatus,
    status: OrderStatus,
  ) -> Result<Self> {
    validate_draft(&draft)?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    let items = draft
      .items
      .into_iter()
      .map(|line| OrderItem {
        id: Uuid::new_v4(),
        order_id: id,
        product_id: line.product_id,
        quantity: line.quantity,
        unit_price: line.unit_price,
      })
      .collect();

    Ok(Self {
      id,
      user_id,
      items,
      shipping_address: draft.shipping_address,
      payment_method,
      payment_gateway,
      shipping_charge: draft.shipping_charge,
      total: draft.total,
      merchant_transaction_id,
      gateway_transaction_id: None,
      payment_status,
      status,
      created_at: now,
      updated_at: now,
    })
  }
}

// Creation-time invariants. The total is checked once here and never
// re-derived later.
fn validate_draft(draft: &OrderDraft) -> Result<()> {
  if draft.items.is_empty() {
    return Err(AppError::Validation("Order must contain at least one item".to_string()));
  }
  for line in &draft.items {
    if line.quantity < 1 {
      return Err(AppError::Validation(format!(
        "Invalid quantity {} for product {}",
        line.quantity, line.product_id
      )));
    }
    if line.unit_price < Decimal::ZERO {
      return Err(AppError::Validation(format!(
        "Negative unit price for product {}",
        line.product_id
      )));
    }
  }
  if draft.shipping_charge < Decimal::ZERO {
    return Err(AppError::Validation("Shipping charge cannot be negative".to_string()));
  }
  if draft.total <= Decimal::ZERO {
    return Err(AppError::Validation("Order total must be positive".to_string()));
  }

  // Checked arithmetic: drafts are client input, and Decimal's operators
  // panic rather than wrap when a product or sum leaves its range.
  let computed = draft.items.iter().try_fold(draft.shipping_charge, |sum, line| {
    Decimal::from(line.quantity)
      .checked_mul(line.unit_price)
      .and_then(|line_total| sum.checked_add(line_total))
  });
  let Some(computed) = computed else {
    return Err(AppError::Validation("Order amounts exceed the supported range".to_string()));
  };
  if computed != draft.total {
    return Err(AppError::Validation(format!(
      "Order total {} does not match items plus shipping ({})",
      draft.total, computed
    )));
  }

  Ok(())
}
