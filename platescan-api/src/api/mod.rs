//! HTTP API handlers for platescan-api

pub mod chat;
pub mod detect;
pub mod health;

pub use chat::chat_routes;
pub use detect::detect_routes;
pub use health::health_routes;
