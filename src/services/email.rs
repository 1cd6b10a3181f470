// src/services/email.rs

//! Email rendering for order notifications. Delivery is simulated; the
//! boundary logs what would have gone out over SMTP.

use crate::services::notifications::{Notification, NotificationSink};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

pub struct EmailSink {
  sender: String,
  admin_email: String,
}

impl EmailSink {
  pub fn new(sender: String, admin_email: String) -> Self {
    Self { sender, admin_email }
  }
}

#[async_trait]
impl NotificationSink for EmailSink {
  async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
    match notification {
      Notification::OrderConfirmation {
        recipient,
        order_id,
        total,
      } => {
        send_mock_email(
          recipient,
          &self.sender,
          &format!("Your order {} is confirmed", order_id),
          &format!("Thanks for your purchase! We have received INR {} for order {}.", total, order_id),
        )
        .await
      }
      Notification::AdminOrderAlert {
        order_id,
        total,
        payment_method,
      } => {
        send_mock_email(
          &self.admin_email,
          &self.sender,
          &format!("New order {}", order_id),
          &format!(
            "Order {} placed for INR {} (payment method: {:?}).",
            order_id, total, payment_method
          ),
        )
        .await
      }
    }
  }
}

async fn send_mock_email(to: &str, from: &str, subject: &str, body: &str) -> anyhow::Result<()> {
  info!(
    "Simulating sending email: To='{}', From='{}', Subject='{}'",
    to, from, subject
  );
  tokio::time::sleep(Duration::from_millis(20)).await; // Simulate network latency

  let preview = body.chars().take(50).collect::<String>();
  let message_id = format!("mock_email_{}", uuid::Uuid::new_v4());
  info!(
    "Mock email sent successfully. Message ID: {}, Preview: '{}'",
    message_id, preview
  );
  Ok(())
}
