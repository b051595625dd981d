//! # kosh-db: Persistence and Transactions for Kosh
//!
//! SQLite storage for orders, the stock ledger and sequence counters, plus
//! the caller-facing operations that tie them together.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kosh Data Flow                                 │
//! │                                                                         │
//! │  kosh-api handler (POST /api/orders)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kosh-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   operations.rs ── caller.require(capability)                   │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ order, stock  │    │  (embedded)  │  │   │
//! │  │   │ SqlitePool    │◄───│ sequence      │    │ 001_init.sql │  │   │
//! │  │   │ RetryPolicy   │    │ product       │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) - UNIQUE indexes and triggers back the invariants        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`retry`] - Bounded retry for write transactions
//! - [`repository`] - Repository implementations
//! - [`operations`] - Capability-checked operations on [`Database`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kosh_core::{Caller, LineRequest, Role};
//! use kosh_db::{Database, DbConfig, NewOrder};
//!
//! let db = Database::new(DbConfig::new("kosh.db")).await?;
//! let caller = Caller::new("user-7", Role::Staff);
//!
//! let order = db.create_order(&caller, &new_order).await?;
//! println!("{} {}", order.order_number, order.grand_total());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod operations;
pub mod pool;
pub mod repository;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use retry::RetryPolicy;

// Repository re-exports for convenience
pub use repository::order::{NewOrder, OrderRepository, PaymentUpdate};
pub use repository::product::ProductRepository;
pub use repository::sequence::SequenceRepository;
pub use repository::stock::{MovementFilter, Reconciliation, StockRepository};
