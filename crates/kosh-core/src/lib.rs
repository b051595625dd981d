//! # kosh-core: Pure Order & Inventory Logic
//!
//! The transaction core of the Kosh back office, expressed as pure functions
//! with zero I/O dependencies. `kosh-db` wraps these rules in transactions;
//! `kosh-api` exposes them over HTTP.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kosh Back Office                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 kosh-api (axum handlers)                        │   │
//! │  │   caller + role ──► access gate ──► Database operation          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kosh-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌───────┐ │   │
//! │  │  │ sequence │ │ pricing  │ │  ledger  │ │lifecycle │ │access │ │   │
//! │  │  │ ORD/INV  │ │ GST 18%  │ │ clamped  │ │ payment  │ │ roles │ │   │
//! │  │  │ numbers  │ │ totals   │ │ deltas   │ │ + order  │ │       │ │   │
//! │  │  └──────────┘ └──────────┘ └──────────┘ └──────────┘ └───────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             kosh-db (SQLite, transactions, ledger)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money in paise with integer arithmetic
//! - [`types`] - Products, orders, order items, stock movements
//! - [`pricing`] - Order Total Calculator
//! - [`sequence`] - Order/invoice identifier format
//! - [`ledger`] - Stock movement delta rule and ledger folding
//! - [`lifecycle`] - Payment and order status state machines
//! - [`access`] - Roles and the capability table
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use kosh_core::money::Money;
//! use kosh_core::types::TaxRate;
//!
//! let line = Money::from_rupees(58) * 10; // ₹580.00
//! let gst = line.calculate_tax(TaxRate::GST_STANDARD);
//! assert_eq!(gst.paise(), 10_440); // ₹104.40
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod sequence;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::{authorize, Caller, Capability, Role};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use ledger::{MovementKind, StockEffect};
pub use lifecycle::{OrderStatus, PaymentStatus};
pub use money::Money;
pub use pricing::{price_order, CatalogLookup, LineRequest, OrderTotals, PricedLine, PricedOrder};
pub use sequence::{Period, SequenceScope};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Minimum number of digits in the ordinal part of an order/invoice number.
///
/// `ORD2026100001` has a four digit ordinal; the 10,000th order of a month
/// widens to five digits rather than wrapping.
pub const SEQUENCE_ORDINAL_WIDTH: usize = 4;

/// Largest page a listing endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
