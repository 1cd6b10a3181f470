// src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{auth_handlers, cart_handlers, order_handlers, payment_handlers, product_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

// Called from `main.rs` (and the HTTP tests) to configure the Actix app.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/auth")
          .route("/signup", web::post().to(auth_handlers::signup_handler))
          .route("/signin", web::post().to(auth_handlers::signin_handler))
          .route("/signout", web::post().to(auth_handlers::signout_handler)),
      )
      .service(
        web::scope("/products")
          .route("", web::get().to(product_handlers::list_products_handler))
          .route("", web::post().to(product_handlers::create_product_handler))
          .route("/{product_id}", web::get().to(product_handlers::get_product_handler)),
      )
      .service(
        web::scope("/cart")
          .route("/add", web::post().to(cart_handlers::add_to_cart_handler))
          .route("", web::get().to(cart_handlers::view_cart_handler))
          .route("/{product_id}", web::delete().to(cart_handlers::remove_from_cart_handler)),
      )
      .service(
        // Literal segments are registered before the `{order_id}` catch-all.
        web::scope("/orders")
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("", web::get().to(order_handlers::list_my_orders_handler))
          .route(
            "/initiate-payment",
            web::post().to(order_handlers::initiate_payment_handler),
          )
          .route(
            "/status-by-transaction/{merchant_transaction_id}",
            web::get().to(order_handlers::status_by_transaction_handler),
          )
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route(
            "/{order_id}/status",
            web::patch().to(order_handlers::update_order_status_handler),
          ),
      )
      .service(
        web::scope("/payments").route(
          "/callback",
          web::post().to(payment_handlers::phonepe_callback_handler),
        ),
      ),
  );
}
