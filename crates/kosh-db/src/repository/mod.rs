//! # Repository Module
//!
//! Database repository implementations for Kosh.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Database operation (operations.rs, caller already authorized)          │
//! │       │                                                                 │
//! │       │  db.orders().create(created_by, &new_order)                     │
//! │       ▼                                                                 │
//! │  OrderRepository ──► one transaction:                                   │
//! │       ├── sequence::next_in      (write-first: takes the lock)          │
//! │       ├── product::load_catalog  (current prices)                       │
//! │       ├── insert order + items   (snapshots)                            │
//! │       └── stock::apply_in_tx     (one stock_out per line)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions ending in `_in` / `_in_tx` take `&mut SqliteConnection` so
//! several repositories can share one transaction.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Catalog reads and seed writes
//! - [`SequenceRepository`] - Monthly order/invoice counters
//! - [`StockRepository`] - Stock ledger, summary, reconciliation
//! - [`OrderRepository`] - Order creation, payment, invoicing

pub mod order;
pub mod product;
pub mod sequence;
pub mod stock;

pub use order::OrderRepository;
pub use product::ProductRepository;
pub use sequence::SequenceRepository;
pub use stock::StockRepository;
