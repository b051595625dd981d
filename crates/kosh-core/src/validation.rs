//! # Validation Module
//!
//! Input validation utilities for Kosh.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (kosh-api)                                      │
//! │  ├── Type validation (JSON deserialization)                            │
//! │  └── Caller identity and role                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Operation entry (kosh-db)                                    │
//! │  └── THIS MODULE: field rules, before any transaction starts           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK / NOT NULL constraints                                      │
//! │  ├── UNIQUE constraints (order/invoice numbers, ledger positions)      │
//! │  └── Triggers (immutable ledger, immutable invoice number)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kosh_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("CEM-50").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{CustomerSnapshot, MovementMetadata};
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NOTE_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use kosh_core::validation::validate_sku;
///
/// assert!(validate_sku("CEM-50").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

fn validate_optional_len(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates the customer snapshot attached to a new order.
///
/// ## Rules
/// - `name` required, at most 200 characters
/// - `email`, when present, contains a single `@` with text on both sides
/// - `phone`, when present, is digits with optional `+`, spaces and hyphens
pub fn validate_customer(customer: &CustomerSnapshot) -> ValidationResult<()> {
    let name = customer.name.trim();
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "customer.name".to_string(),
        });
    }
    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "customer.name".to_string(),
            max: 200,
        });
    }

    if let Some(email) = customer.email.as_deref() {
        let parts: Vec<&str> = email.trim().split('@').collect();
        if parts.len() != 2 || parts[0].is_empty() || !parts[1].contains('.') {
            return Err(ValidationError::InvalidFormat {
                field: "customer.email".to_string(),
                reason: "must look like name@domain.tld".to_string(),
            });
        }
    }

    if let Some(phone) = customer.phone.as_deref() {
        let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
        let clean = phone
            .chars()
            .all(|c| c.is_ascii_digit() || c == '+' || c == ' ' || c == '-');
        if !clean || !(7..=15).contains(&digits) {
            return Err(ValidationError::InvalidFormat {
                field: "customer.phone".to_string(),
                reason: "must be 7-15 digits".to_string(),
            });
        }
    }

    validate_optional_len("customer.address", customer.address.as_deref(), 500)?;
    validate_optional_len("customer.tax_id", customer.tax_id.as_deref(), 20)?;

    Ok(())
}

/// Validates a free-text note.
pub fn validate_note(note: Option<&str>) -> ValidationResult<()> {
    validate_optional_len("notes", note, MAX_NOTE_LEN)
}

/// Validates stock movement metadata.
pub fn validate_movement_metadata(metadata: &MovementMetadata) -> ValidationResult<()> {
    if let Some(price) = metadata.unit_price_paise {
        validate_price_paise(price)?;
    }
    validate_optional_len("supplier_name", metadata.supplier_name.as_deref(), 200)?;
    validate_optional_len("supplier_contact", metadata.supplier_contact.as_deref(), 200)?;
    validate_optional_len("supplier_reference", metadata.supplier_reference.as_deref(), 100)?;
    validate_optional_len("note", metadata.note.as_deref(), MAX_NOTE_LEN)?;
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a price in paise.
///
/// ## Example
/// ```rust
/// use kosh_core::validation::validate_price_paise;
///
/// assert!(validate_price_paise(5800).is_ok());
/// assert!(validate_price_paise(0).is_ok());
/// assert!(validate_price_paise(-100).is_err());
/// ```
pub fn validate_price_paise(paise: i64) -> ValidationResult<()> {
    if paise < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

/// Validates a recorded amount paid. Zero is allowed (nothing paid yet).
pub fn validate_amount_paid(paise: i64) -> ValidationResult<()> {
    if paise < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "amount_paid".to_string(),
        });
    }

    Ok(())
}

/// Normalizes paging parameters.
///
/// ## Rules
/// - `page` defaults to 1 and must be ≥ 1
/// - `page_size` defaults to `DEFAULT_PAGE_SIZE`, must be 1..=`MAX_PAGE_SIZE`
///
/// ## Returns
/// `(page, page_size)` with defaults applied.
pub fn validate_page(page: Option<u32>, page_size: Option<u32>) -> ValidationResult<(u32, u32)> {
    let page = page.unwrap_or(1);
    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "page_size".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE as i64,
        });
    }

    Ok((page, page_size))
}

// =============================================================================
// Unit Tests
// =============================================================================
