//! HTTP request handlers

pub mod health;
pub mod products;
pub mod reporting;
pub mod stock;

pub use health::health_check;
pub use products::*;
pub use reporting::*;
pub use stock::*;
