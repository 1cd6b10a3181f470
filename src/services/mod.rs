// src/services/mod.rs

pub mod auth_service;
pub mod email;
pub mod notifications;
pub mod order_service;
