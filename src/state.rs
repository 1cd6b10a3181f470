// src/state.rs

use crate::config::AppConfig;
use crate::payments::GatewayClient;
use crate::services::notifications::Notifier;
use crate::services::order_service::OrderService;
use crate::store::{CartStore, OrderStore, ProductStore, SessionStore, UserStore};
use std::sync::Arc;

/// Shared per-worker state handed to every handler.
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<AppConfig>,
  pub users: Arc<dyn UserStore>,
  pub sessions: Arc<dyn SessionStore>,
  pub products: Arc<dyn ProductStore>,
  pub carts: Arc<dyn CartStore>,
  pub orders: Arc<OrderService>,
}

impl AppState {
  /// Wires one storage adapter into every port plus the order service.
  /// `gateway` is `None` when the PhonePe credentials are absent.
  pub fn build<S>(
    config: Arc<AppConfig>,
    store: S,
    gateway: Option<Arc<dyn GatewayClient>>,
    notifier: Notifier,
  ) -> Self
  where
    S: UserStore + SessionStore + ProductStore + CartStore + OrderStore + Clone + 'static,
  {
    let users: Arc<dyn UserStore> = Arc::new(store.clone());
    let order_service = OrderService::new(Arc::new(store.clone()), users.clone(), gateway, notifier);

    Self {
      config,
      users,
      sessions: Arc::new(store.clone()),
      products: Arc::new(store.clone()),
      carts: Arc::new(store),
      orders: Arc::new(order_service),
    }
  }
}
