//! HTTP services. Each module owns its routes and merges into the app router.

pub mod health_service;
pub mod order_service;
pub mod stock_service;
