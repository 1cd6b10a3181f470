// tests/callback_tests.rs
//
// Callback reconciliation: the server-to-server callback is the authority on
// payment state, and every payment-state write must apply at most once no
// matter how often or in what order PhonePe retries.

mod common;
use common::*;

use rust_decimal_macros::dec;
use storefront_api::models::{OrderStatus, PaymentStatus};
use storefront_api::services::order_service::CallbackOutcome;

/// Places an online order for 500.00 and hands back its transaction id.
async fn pending_order(h: &TestHarness) -> (uuid::Uuid, String) {
  let user = seed_user(&h.store, "asha@example.com", false).await;
  let receipt = h
    .orders
    .initiate_online_payment(user.id, draft_with_total(dec!(500.00)))
    .await
    .unwrap();
  (receipt.order_id, receipt.merchant_transaction_id)
}

#[tokio::test]
async fn success_callback_marks_paid_and_moves_to_fulfilment() {
  let h = harness();
  let (order_id, txn) = pending_order(&h).await;

  let outcome = h
    .orders
    .reconcile_callback(envelope_from(&success_callback_json(&txn, 50_000)))
    .await
    .unwrap();
  assert!(matches!(outcome, CallbackOutcome::Finalized(_)));

  let order = h.orders.get_order(order_id).await.unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Paid);
  assert_eq!(order.status, OrderStatus::Processing);
  assert_eq!(order.gateway_transaction_id.as_deref(), Some("T2408281440"));

  assert!(wait_until(1_000, || h.sink.total() == 2).await);
  assert_eq!(
    h.sink.confirmations(),
    vec![("asha@example.com".to_string(), order_id)]
  );
  assert_eq!(h.sink.admin_alerts(), 1);
}

#[tokio::test]
async fn amount_mismatch_parks_the_order_for_review() {
  let h = harness();
  let (order_id, txn) = pending_order(&h).await;

  // Gateway says 400.00 was captured for a 500.00 order.
  let outcome = h
    .orders
    .reconcile_callback(envelope_from(&success_callback_json(&txn, 40_000)))
    .await
    .unwrap();
  assert!(matches!(outcome, CallbackOutcome::Finalized(_)));

  let order = h.orders.get_order(order_id).await.unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Paid);
  assert_eq!(order.status, OrderStatus::PaymentIssue);
  assert_eq!(order.gateway_transaction_id.as_deref(), Some("T2408281440"));
}

#[tokio::test]
async fn success_callback_without_amount_also_parks_the_order() {
  let h = harness();
  let (order_id, txn) = pending_order(&h).await;

  let mut body = success_callback_json(&txn, 0);
  body["data"]
    .as_object_mut()
    .unwrap()
    .remove("amount");

  let outcome = h
    .orders
    .reconcile_callback(envelope_from(&body))
    .await
    .unwrap();
  assert!(matches!(outcome, CallbackOutcome::Finalized(_)));

  let order = h.orders.get_order(order_id).await.unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Paid);
  assert_eq!(order.status, OrderStatus::PaymentIssue);
}

#[tokio::test]
async fn failure_callback_marks_payment_failed() {
  let h = harness();
  let (order_id, txn) = pending_order(&h).await;

  let outcome = h
    .orders
    .reconcile_callback(envelope_from(&failure_callback_json(&txn)))
    .await
    .unwrap();
  assert!(matches!(outcome, CallbackOutcome::Finalized(_)));

  let order = h.orders.get_order(order_id).await.unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Failed);
  assert_eq!(order.status, OrderStatus::PaymentFailed);
  assert_eq!(order.gateway_transaction_id.as_deref(), Some("T2408281441"));

  tokio::time::sleep(std::time::Duration::from_millis(50)).await;
  assert_eq!(h.sink.total(), 0);
}

#[tokio::test]
async fn duplicate_success_callback_changes_nothing() {
  let h = harness();
  let (order_id, txn) = pending_order(&h).await;
  let envelope = envelope_from(&success_callback_json(&txn, 50_000));

  let first = h.orders.reconcile_callback(envelope.clone()).await.unwrap();
  assert!(matches!(first, CallbackOutcome::Finalized(_)));
  assert!(wait_until(1_000, || h.sink.total() == 2).await);

  let second = h.orders.reconcile_callback(envelope).await.unwrap();
  assert!(matches!(second, CallbackOutcome::AlreadyFinal));

  let order = h.orders.get_order(order_id).await.unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Paid);
  assert_eq!(order.status, OrderStatus::Processing);

  // The retry must not produce a second confirmation.
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;
  assert_eq!(h.sink.total(), 2);
}

#[tokio::test]
async fn late_failure_callback_cannot_clobber_a_paid_order() {
  let h = harness();
  let (order_id, txn) = pending_order(&h).await;

  h.orders
    .reconcile_callback(envelope_from(&success_callback_json(&txn, 50_000)))
    .await
    .unwrap();

  let outcome = h
    .orders
    .reconcile_callback(envelope_from(&failure_callback_json(&txn)))
    .await
    .unwrap();
  assert!(matches!(outcome, CallbackOutcome::AlreadyFinal));

  let order = h.orders.get_order(order_id).await.unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Paid);
  assert_eq!(order.status, OrderStatus::Processing);
  assert_eq!(order.gateway_transaction_id.as_deref(), Some("T2408281440"));
}

#[tokio::test]
async fn late_success_callback_cannot_revive_a_failed_order() {
  let h = harness();
  let user = seed_user(&h.store, "asha@example.com", false).await;
  h.gateway.set(GatewayScript::Decline {
    message: "INSTRUMENT_FAILED".to_string(),
  });

  h.orders
    .initiate_online_payment(user.id, draft_with_total(dec!(500.00)))
    .await
    .unwrap_err();
  let orders = h.orders.list_orders_for_user(user.id).await.unwrap();
  let order_id = orders[0].id;
  let txn = orders[0].merchant_transaction_id.clone().unwrap();

  // A success callback for the same transaction straggles in afterwards.
  let outcome = h
    .orders
    .reconcile_callback(envelope_from(&success_callback_json(&txn, 50_000)))
    .await
    .unwrap();
  assert!(matches!(outcome, CallbackOutcome::AlreadyFinal));

  let order = h.orders.get_order(order_id).await.unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Failed);
  assert_eq!(order.status, OrderStatus::PaymentFailed);

  tokio::time::sleep(std::time::Duration::from_millis(50)).await;
  assert_eq!(h.sink.total(), 0);
}

#[tokio::test]
async fn racing_duplicate_callbacks_settle_exactly_once() {
  let h = harness();
  let (order_id, txn) = pending_order(&h).await;
  let envelope = envelope_from(&success_callback_json(&txn, 50_000));

  let (a, b) = tokio::join!(
    h.orders.reconcile_callback(envelope.clone()),
    h.orders.reconcile_callback(envelope),
  );
  let outcomes = [a.unwrap(), b.unwrap()];

  let finalized = outcomes
    .iter()
    .filter(|o| matches!(o, CallbackOutcome::Finalized(_)))
    .count();
  let already_final = outcomes
    .iter()
    .filter(|o| matches!(o, CallbackOutcome::AlreadyFinal))
    .count();
  assert_eq!(finalized, 1);
  assert_eq!(already_final, 1);

  let order = h.orders.get_order(order_id).await.unwrap();
  assert_eq!(order.payment_status, PaymentStatus::Paid);

  assert!(wait_until(1_000, || h.sink.total() == 2).await);
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;
  assert_eq!(h.sink.confirmations().len(), 1);
  assert_eq!(h.sink.admin_alerts(), 1);
}

#[tokio::test]
async fn callback_for_unknown_transaction_is_acknowledged() {
  let h = harness();

  let outcome = h
    .orders
    .reconcile_callback(envelope_from(&success_callback_json("MT_unseen", 50_000)))
    .await
    .unwrap();
  assert!(matches!(outcome, CallbackOutcome::UnknownTransaction));
}

#[tokio::test]
async fn callback_without_transaction_id_is_acknowledged() {
  let h = harness();

  let mut body = success_callback_json("", 50_000);
  body["data"]
    .as_object_mut()
    .unwrap()
    .remove("merchantTransactionId");

  let outcome = h
    .orders
    .reconcile_callback(envelope_from(&body))
    .await
    .unwrap();
  assert!(matches!(outcome, CallbackOutcome::MissingTransactionId));
}
