// src/models/mod.rs

pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod product;
pub mod session;
pub mod user;

pub use cart_item::CartItem;
pub use order::{
  Order, OrderDraft, OrderStatus, PaymentGateway, PaymentMethod, PaymentStatus, ShippingAddress,
};
pub use order_item::{OrderItem, OrderItemDraft};
pub use product::Product;
pub use session::Session;
pub use user::User;
