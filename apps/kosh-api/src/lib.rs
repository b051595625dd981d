//! # Kosh API
//!
//! HTTP surface of the order & inventory core.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Kosh API Server                               │
//! │                                                                         │
//! │  gateway ──► axum (TraceLayer) ──► services ──► kosh_db::Database      │
//! │  (x-user-id,       │                  │               │                 │
//! │   x-user-role)     ▼                  ▼               ▼                 │
//! │              Authenticated      order_service    capability gate +      │
//! │              extractor (401)    stock_service    one transaction per    │
//! │                                 health_service   write (403/409/...)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]: defaults, then the TOML file named by `KOSH_CONFIG`,
//! then `KOSH_*` environment variables.

pub mod auth;
pub mod config;
pub mod error;
pub mod services;

use axum::Router;
use tower_http::trace::TraceLayer;

use kosh_db::Database;

// Re-exports
pub use crate::config::ApiConfig;
pub use crate::error::{ApiError, ErrorCode};

/// Shared application state. Cheap to clone; the pool is shared.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db }
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(services::order_service::router())
        .merge(services::stock_service::router())
        .merge(services::health_service::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
