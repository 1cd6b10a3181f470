// src/services/order_service.rs

//! Order lifecycle controller.
//!
//! Owns every transition of the `(payment_status, status)` pair. Payment
//! finality is enforced by the store's conditional finalize, so two racing
//! callers (callback vs. callback, or callback vs. a synchronous decline)
//! can never both apply a transition.

use crate::errors::{AppError, Result};
use crate::models::{Order, OrderDraft, OrderStatus, PaymentStatus};
use crate::payments::phonepe::CallbackEnvelope;
use crate::payments::{txn_id, GatewayClient, GatewayError, PaymentInitiation};
use crate::services::notifications::{Notification, Notifier};
use crate::store::{FinalizeOutcome, OrderStore, PaymentResolution, UserStore};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Returned by the online initiation flow; the client is sent to
/// `redirect_url` and later polls by `merchant_transaction_id`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
  pub redirect_url: String,
  pub merchant_transaction_id: String,
  pub order_id: Uuid,
}

/// Read model for the post-redirect status poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
  pub order_id: Uuid,
  pub payment_status: PaymentStatus,
}

/// What a processed callback amounted to. Every variant is acknowledged with
/// HTTP 200; the distinction is for logging and tests.
#[derive(Debug)]
pub enum CallbackOutcome {
  /// This callback performed the payment transition.
  Finalized(Order),
  /// The order was already Paid or Failed; nothing changed.
  AlreadyFinal,
  /// No order carries the given merchant transaction id.
  UnknownTransaction,
  /// The callback did not carry a merchant transaction id at all.
  MissingTransactionId,
}

pub struct OrderService {
  orders: Arc<dyn OrderStore>,
  users: Arc<dyn UserStore>,
  gateway: Option<Arc<dyn GatewayClient>>,
  notifier: Notifier,
}

impl OrderService {
  pub fn new(
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserStore>,
    gateway: Option<Arc<dyn GatewayClient>>,
    notifier: Notifier,
  ) -> Self {
    Self {
      orders,
      users,
      gateway,
      notifier,
    }
  }

  /// Places a cash-on-delivery order. Notifications are best effort; the
  /// order stands even if every email fails.
  #[instrument(name = "order_service::create_cash_order", skip(self, draft), fields(user_id = %user_id))]
  pub async fn create_cash_order(&self, user_id: Uuid, user_email: &str, draft: OrderDraft) -> Result<Order> {
    let order = Order::new_cash(user_id, draft)?;
    self.orders.insert_order(&order).await?;

    self.notifier.enqueue(Notification::OrderConfirmation {
      recipient: user_email.to_string(),
      order_id: order.id,
      total: order.total,
    });
    self.notifier.enqueue(Notification::AdminOrderAlert {
      order_id: order.id,
      total: order.total,
      payment_method: order.payment_method,
    });

    Ok(order)
  }

  /// Creates a Pending online order and asks the gateway for a hosted-page
  /// redirect.
  ///
  /// A declined call finalizes the order Failed/PaymentFailed through the
  /// same conditional operation callbacks use; an unconfirmed call leaves it
  /// Pending because only the callback knows the real outcome.
  #[instrument(name = "order_service::initiate_online_payment", skip(self, draft), fields(user_id = %user_id))]
  pub async fn initiate_online_payment(&self, user_id: Uuid, draft: OrderDraft) -> Result<PaymentReceipt> {
    let gateway = self
      .gateway
      .clone()
      .ok_or_else(|| AppError::GatewayConfig("Online payment is not enabled on this deployment".to_string()))?;

    let merchant_transaction_id = txn_id::generate();
    let order = Order::new_online(user_id, draft, merchant_transaction_id.clone())?;
    self.orders.insert_order(&order).await?;

    let initiation = PaymentInitiation {
      merchant_transaction_id: merchant_transaction_id.clone(),
      user_id,
      amount: order.total,
      mobile: order.shipping_address.phone.clone(),
    };

    match gateway.initiate(&initiation).await {
      Ok(initiated) => Ok(PaymentReceipt {
        redirect_url: initiated.redirect_url,
        merchant_transaction_id,
        order_id: order.id,
      }),
      Err(err @ (GatewayError::Request(_) | GatewayError::Declined { .. })) => {
        // The gateway refused (or the request never left); no money can be
        // in flight. A callback that raced us wins harmlessly: the finalize
        // is conditional.
        let outcome = self
          .orders
          .finalize_payment(
            &merchant_transaction_id,
            PaymentResolution {
              payment_status: PaymentStatus::Failed,
              order_status: OrderStatus::PaymentFailed,
              gateway_transaction_id: None,
            },
          )
          .await?;
        if let FinalizeOutcome::AlreadyFinal(existing) = &outcome {
          warn!(
            order_id = %existing.id,
            payment_status = ?existing.payment_status,
            "Decline raced an earlier finalization; keeping the existing state"
          );
        }
        Err(err.into())
      }
      Err(err @ GatewayError::Unconfirmed { .. }) => {
        // Timeout or transport trouble: the payment may still complete, so
        // the order stays Pending and the callback settles it.
        warn!(
          merchant_transaction_id = %merchant_transaction_id,
          "Gateway outcome unconfirmed; order left pending for the callback"
        );
        Err(err.into())
      }
    }
  }

  /// Applies a verified gateway callback. Safe to call any number of times
  /// for the same transaction; only the first caller past the store's
  /// conditional gate performs the transition and sends notifications.
  #[instrument(name = "order_service::reconcile_callback", skip(self, envelope))]
  pub async fn reconcile_callback(&self, envelope: CallbackEnvelope) -> Result<CallbackOutcome> {
    let merchant_transaction_id = envelope.data.merchant_transaction_id.clone();
    if merchant_transaction_id.is_empty() {
      warn!("Callback carried no merchant transaction id; acknowledging without processing");
      return Ok(CallbackOutcome::MissingTransactionId);
    }

    let Some(order) = self.orders.order_by_merchant_txn(&merchant_transaction_id).await? else {
      warn!(
        merchant_transaction_id = %merchant_transaction_id,
        "Callback for unknown transaction; acknowledging without processing"
      );
      return Ok(CallbackOutcome::UnknownTransaction);
    };

    if order.payment_status.is_final() {
      return Ok(CallbackOutcome::AlreadyFinal);
    }

    let resolution = classify(&envelope, &order);
    let paid = resolution.payment_status == PaymentStatus::Paid;

    match self.orders.finalize_payment(&merchant_transaction_id, resolution).await? {
      FinalizeOutcome::Applied(updated) => {
        if paid {
          self.notify_payment_captured(&updated).await;
        }
        Ok(CallbackOutcome::Finalized(updated))
      }
      FinalizeOutcome::AlreadyFinal(_) => Ok(CallbackOutcome::AlreadyFinal),
      FinalizeOutcome::NotFound => Ok(CallbackOutcome::UnknownTransaction),
    }
  }

  /// Admin fulfilment update. Payment fields are never touched here.
  #[instrument(name = "order_service::update_fulfillment_status", skip(self))]
  pub async fn update_fulfillment_status(&self, order_id: Uuid, status: &str) -> Result<Order> {
    let status: OrderStatus = status.parse()?;
    self
      .orders
      .update_fulfillment(order_id, status)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))
  }

  /// Read path for the post-redirect frontend poll.
  pub async fn payment_status_by_txn(&self, merchant_transaction_id: &str) -> Result<PaymentStatusView> {
    let order = self
      .orders
      .order_by_merchant_txn(merchant_transaction_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("No order for transaction {}", merchant_transaction_id)))?;
    Ok(PaymentStatusView {
      order_id: order.id,
      payment_status: order.payment_status,
    })
  }

  pub async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    self.orders.orders_for_user(user_id).await
  }

  pub async fn get_order(&self, order_id: Uuid) -> Result<Order> {
    self
      .orders
      .order_by_id(order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))
  }

  // Runs only on the winning Paid transition, which is what makes the
  // confirmation at-most-once per order.
  async fn notify_payment_captured(&self, order: &Order) {
    match self.users.user_by_id(order.user_id).await {
      Ok(Some(user)) => self.notifier.enqueue(Notification::OrderConfirmation {
        recipient: user.email,
        order_id: order.id,
        total: order.total,
      }),
      Ok(None) => warn!(order_id = %order.id, "Paid order has no matching user; skipping confirmation"),
      Err(err) => warn!(order_id = %order.id, error = %err, "User lookup failed; skipping confirmation"),
    }
    self.notifier.enqueue(Notification::AdminOrderAlert {
      order_id: order.id,
      total: order.total,
      payment_method: order.payment_method,
    });
  }
}

/// Maps a verified callback to the transition it requests, against the
/// order's recorded total.
fn classify(envelope: &CallbackEnvelope, order: &Order) -> PaymentResolution {
  let gateway_transaction_id = if envelope.data.transaction_id.is_empty() {
    None
  } else {
    Some(envelope.data.transaction_id.clone())
  };

  if envelope.is_payment_success() {
    // A missing amount counts as a mismatch, and so does an order total too
    // large to express in paise; the money is captured either way, so the
    // order parks in PaymentIssue rather than failing.
    let amount_matches = match (
      envelope.data.amount,
      order.total.checked_mul(Decimal::ONE_HUNDRED),
    ) {
      (Some(paise), Some(expected_paise)) => Decimal::from(paise) == expected_paise,
      _ => false,
    };

    let order_status = if amount_matches {
      OrderStatus::Processing
    } else {
      warn!(
        order_id = %order.id,
        reported_paise = ?envelope.data.amount,
        expected_total = %order.total,
        "Callback amount disagrees with the order total"
      );
      OrderStatus::PaymentIssue
    };

    PaymentResolution {
      payment_status: PaymentStatus::Paid,
      order_status,
      gateway_transaction_id,
    }
  } else {
    PaymentResolution {
      payment_status: PaymentStatus::Failed,
      order_status: OrderStatus::PaymentFailed,
      gateway_transaction_id,
    }
  }
}
