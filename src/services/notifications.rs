// src/services/notifications.rs

//! Fire-and-forget notification delivery.
//!
//! Request handlers enqueue onto a bounded channel and move on; a single
//! background worker drains it and delivers through a [`NotificationSink`],
//! retrying transient failures with exponential backoff. A full queue drops
//! the notification with a warning instead of blocking the request path.

use crate::models::PaymentMethod;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use uuid::Uuid;

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum Notification {
  OrderConfirmation {
    recipient: String,
    order_id: Uuid,
    total: Decimal,
  },
  AdminOrderAlert {
    order_id: Uuid,
    total: Decimal,
    payment_method: PaymentMethod,
  },
}

impl Notification {
  pub fn kind(&self) -> &'static str {
    match self {
      Notification::OrderConfirmation { .. } => "order_confirmation",
      Notification::AdminOrderAlert { .. } => "admin_order_alert",
    }
  }
}

/// Delivery boundary the worker talks to. The production implementation is
/// [`crate::services::email::EmailSink`].
#[async_trait]
pub trait NotificationSink: Send + Sync {
  async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Retry policy for a single notification.
#[derive(Clone, Debug)]
pub struct RetryConfig {
  /// Maximum number of delivery attempts.
  pub max_attempts: u32,
  /// Delay before the first retry.
  pub initial_delay: Duration,
  /// Ceiling for the backoff delay.
  pub max_delay: Duration,
  /// Multiplier applied to the delay after each failed attempt.
  pub multiplier: f64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      initial_delay: Duration::from_millis(100),
      max_delay: Duration::from_secs(10),
      multiplier: 2.0,
    }
  }
}

/// Cloneable handle to the notification worker.
#[derive(Clone)]
pub struct Notifier {
  tx: mpsc::Sender<Notification>,
}

impl Notifier {
  /// Spawns the background worker and returns the enqueue handle. The worker
  /// stops when every handle has been dropped and the queue drains.
  pub fn spawn(sink: Arc<dyn NotificationSink>, retry: RetryConfig) -> Self {
    let (tx, mut rx) = mpsc::channel::<Notification>(QUEUE_CAPACITY);
    tokio::spawn(async move {
      while let Some(notification) = rx.recv().await {
        deliver_with_retry(sink.as_ref(), &notification, &retry).await;
      }
      tracing::debug!("Notification worker shut down.");
    });
    Self { tx }
  }

  /// Never blocks and never fails the caller; an unavailable queue logs and
  /// drops.
  pub fn enqueue(&self, notification: Notification) {
    let kind = notification.kind();
    if let Err(err) = self.tx.try_send(notification) {
      tracing::warn!(error = %err, kind, "Dropping notification; queue full or worker gone");
    }
  }
}

async fn deliver_with_retry(sink: &dyn NotificationSink, notification: &Notification, config: &RetryConfig) {
  let mut attempt = 0;
  let mut delay = config.initial_delay;

  loop {
    attempt += 1;
    match sink.deliver(notification).await {
      Ok(()) => {
        if attempt > 1 {
          tracing::info!(attempt, kind = notification.kind(), "Notification delivered after retry");
        }
        return;
      }
      Err(error) if attempt >= config.max_attempts => {
        tracing::error!(
          attempt,
          error = %error,
          kind = notification.kind(),
          "Giving up on notification after all attempts"
        );
        return;
      }
      Err(error) => {
        tracing::warn!(
          attempt,
          error = %error,
          delay_ms = delay.as_millis() as u64,
          kind = notification.kind(),
          "Notification delivery failed; retrying after delay"
        );
        sleep(delay).await;
        delay = Duration::from_millis(((delay.as_millis() as f64) * config.multiplier) as u64);
        delay = delay.min(config.max_delay);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;
  use std::sync::atomic::{AtomicU32, Ordering};

  /// Sink that fails a configured number of times before succeeding.
  struct FlakySink {
    failures_before_success: u32,
    attempts: AtomicU32,
    delivered: AtomicU32,
  }

  impl FlakySink {
    fn new(failures_before_success: u32) -> Self {
      Self {
        failures_before_success,
        attempts: AtomicU32::new(0),
        delivered: AtomicU32::new(0),
      }
    }
  }

  #[async_trait]
  impl NotificationSink for FlakySink {
    async fn deliver(&self, _notification: &Notification) -> anyhow::Result<()> {
      let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
      if attempt < self.failures_before_success {
        anyhow::bail!("transient outage");
      }
      self.delivered.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  }

  fn fast_retry() -> RetryConfig {
    RetryConfig {
      max_attempts: 3,
      initial_delay: Duration::from_millis(5),
      max_delay: Duration::from_millis(20),
      multiplier: 2.0,
    }
  }

  fn sample() -> Notification {
    Notification::OrderConfirmation {
      recipient: "asha@example.com".to_string(),
      order_id: Uuid::new_v4(),
      total: dec!(500.00),
    }
  }

  #[tokio::test]
  async fn delivery_retries_until_it_succeeds() {
    let sink = FlakySink::new(2);
    deliver_with_retry(&sink, &sample(), &fast_retry()).await;
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(sink.delivered.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn delivery_gives_up_after_max_attempts() {
    let sink = FlakySink::new(10);
    deliver_with_retry(&sink, &sample(), &fast_retry()).await;
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(sink.delivered.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn enqueue_hands_off_to_the_worker() {
    let sink = Arc::new(FlakySink::new(0));
    let notifier = Notifier::spawn(sink.clone(), fast_retry());
    notifier.enqueue(sample());

    // The worker runs on its own task; give it a beat.
    for _ in 0..50 {
      if sink.delivered.load(Ordering::SeqCst) == 1 {
        return;
      }
      sleep(Duration::from_millis(10)).await;
    }
    panic!("notification was not delivered");
  }
}
