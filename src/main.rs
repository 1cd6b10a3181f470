// src/main.rs

use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

use storefront_api::payments::phonepe::PhonePeClient;
use storefront_api::payments::GatewayClient;
use storefront_api::services::email::EmailSink;
use storefront_api::services::notifications::{Notifier, RetryConfig};
use storefront_api::store::postgres::PostgresStore;
use storefront_api::web::routes;
use storefront_api::{AppConfig, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE) // Log when spans close, showing duration
    .init();

  tracing::info!("Starting storefront API server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      panic!("Configuration error: {}", e);
    }
  };

  let db_pool = match PgPool::connect(&app_config.database_url).await {
    Ok(pool) => {
      tracing::info!("Successfully connected to the database.");
      pool
    }
    Err(e) => {
      tracing::error!(error = %e, "Failed to connect to the database.");
      panic!("Database connection error: {}", e);
    }
  };
  let store = PostgresStore::new(db_pool);

  let gateway: Option<Arc<dyn GatewayClient>> = match app_config.phonepe.clone() {
    Some(phonepe_config) => match PhonePeClient::new(phonepe_config) {
      Ok(client) => {
        tracing::info!("PhonePe gateway client initialized.");
        Some(Arc::new(client))
      }
      Err(e) => {
        tracing::error!(error = %e, "Failed to initialize the PhonePe client.");
        panic!("Gateway client error: {}", e);
      }
    },
    None => None,
  };

  let email_sink = Arc::new(EmailSink::new(
    app_config.email_sender.clone(),
    app_config.admin_email.clone(),
  ));
  let notifier = Notifier::spawn(email_sink, RetryConfig::default());

  let app_state = AppState::build(app_config.clone(), store, gateway, notifier);

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(app_state.clone())) // Share AppState with handlers
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(routes::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
