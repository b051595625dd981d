//! # Error Types
//!
//! Domain-specific error types for kosh-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kosh-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kosh-db errors (separate crate)                                       │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  kosh-api errors (in app)                                              │
//! │  └── ApiError         - What HTTP callers see (code + message)         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → HTTP status  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant reports an [`ErrorKind`], the caller-facing class that
//! decides whether a failure is correctable, retryable or opaque.

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Caller-facing error class.
///
/// ```text
/// Validation  → 400  fix the input and resend
/// Forbidden   → 403  role lacks the capability
/// NotFound    → 404  unknown product / order
/// Conflict    → 409  retry later or re-read state first
/// Unavailable → 503  storage unreachable or saturated
/// Internal    → 500  opaque, details only in logs
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Forbidden,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found, or is inactive.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Requested quantity is zero or negative.
    #[error("Invalid quantity {quantity}: must be a positive integer")]
    InvalidQuantity { quantity: i64 },

    /// An invoice was already issued for the order.
    ///
    /// ## When This Occurs
    /// ```text
    /// issue_invoice(order)  → INV2026100007, status completed
    /// issue_invoice(order)  → InvoiceAlreadyIssued { INV2026100007 }
    ///                         (order untouched)
    /// ```
    #[error("Order {order_number} already has invoice {invoice_number}")]
    InvoiceAlreadyIssued {
        order_number: String,
        invoice_number: String,
    },

    /// The order status machine does not allow the move.
    #[error("Order {order_number} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        order_number: String,
        from: String,
        to: String,
    },

    /// Aggregates disagree with the line items they were computed from.
    #[error("Order totals do not match line items: {field} expected {expected}, got {actual}")]
    TotalsMismatch {
        field: &'static str,
        expected: i64,
        actual: i64,
    },

    /// A movement in a product's ledger does not follow from its predecessor.
    #[error("Ledger for product {product_id} breaks at position {ledger_seq}: {reason}")]
    LedgerInconsistent {
        product_id: String,
        ledger_seq: i64,
        reason: String,
    },

    /// The caller's role does not carry the capability.
    #[error("Role {role} is not allowed to {capability}")]
    Forbidden { role: String, capability: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the caller-facing class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProductNotFound(_) | CoreError::OrderNotFound(_) => ErrorKind::NotFound,
            CoreError::InvalidQuantity { .. } | CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::InvoiceAlreadyIssued { .. } | CoreError::InvalidStatusTransition { .. } => {
                ErrorKind::Conflict
            }
            CoreError::Forbidden { .. } => ErrorKind::Forbidden,
            CoreError::TotalsMismatch { .. } | CoreError::LedgerInconsistent { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Creates a NotAllowed error from a static list of accepted values.
    pub fn not_allowed(field: impl Into<String>, allowed: &[&str]) -> Self {
        ValidationError::NotAllowed {
            field: field.into(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
