//! # Domain Types
//!
//! Core domain types used throughout Kosh.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Order      │   │ StockMovement   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  order_number   │   │  product_id     │       │
//! │  │  name, unit     │   │  invoice_number │   │  ledger_seq     │       │
//! │  │  price_paise    │   │  items[]        │   │  kind, quantity │       │
//! │  └─────────────────┘   │  totals, status │   │  previous/new   │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │   OrderItem     │   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  product        │   │  Cash, Card     │       │
//! │  │  1800 = 18% GST │   │  snapshot       │   │  Upi, ...       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, order_number, invoice_number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::MovementKind;
use crate::lifecycle::{OrderStatus, PaymentStatus};
use crate::money::Money;
use crate::pricing::PricedLine;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1800 bps = 18% (standard GST slab)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// The GST rate applied to every order line.
    pub const GST_STANDARD: TaxRate = TaxRate(1800);

    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::GST_STANDARD
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog entry.
///
/// Owned by catalog management; orders only read its price and active flag.
/// There is no stored stock or availability column: both are derived from
/// the product's stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name, copied onto order lines.
    pub name: String,

    pub category: Option<String>,

    /// Unit of measure ("pcs", "kg", "box").
    pub unit: String,

    /// Current unit price in paise.
    pub price_paise: i64,

    /// Inactive products cannot be ordered.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    BankTransfer,
    /// Goods on account; settled later through payment updates.
    Credit,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Customer Snapshot
// =============================================================================

/// Customer details denormalized onto the order at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// GSTIN or other tax registration number.
    pub tax_id: Option<String>,
}

// =============================================================================
// Order
// =============================================================================

/// An order with its line items and payment state.
///
/// ## Aggregates
/// ```text
/// subtotal     = Σ (quantity × unit_price − discount)
/// total_gst    = Σ gst
/// grand_total  = subtotal + total_gst        (discount is not subtracted again)
/// amount_due   = grand_total − amount_paid   (negative = customer credit)
/// ```
///
/// Orders are never deleted; cancellation is a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    /// Set exactly once, by invoice issuance.
    pub invoice_number: Option<String>,
    pub customer: CustomerSnapshot,
    pub items: Vec<OrderItem>,
    pub subtotal_paise: i64,
    pub total_discount_paise: i64,
    pub total_gst_paise: i64,
    pub grand_total_paise: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub amount_paid_paise: i64,
    pub amount_due_paise: i64,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_by: String,
    /// Last caller to change payment, status or invoice.
    pub processed_by: Option<String>,
    /// Bumped on every update; used for optimistic checks.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub invoiced_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_paise(self.grand_total_paise)
    }

    #[inline]
    pub fn amount_due(&self) -> Money {
        Money::from_paise(self.amount_due_paise)
    }

    /// Amount the customer has overpaid, if any.
    ///
    /// ## Example
    /// An order with grand total ₹100.00 and ₹150.00 paid has
    /// `amount_due = -₹50.00` and `credit() = Some(₹50.00)`.
    pub fn credit(&self) -> Option<Money> {
        if self.amount_due_paise < 0 {
            Some(Money::from_paise(-self.amount_due_paise))
        } else {
            None
        }
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern to freeze product data at time of ordering, so
/// later catalog edits never change historical invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// 1-based position within the order.
    pub line_no: i64,
    pub product_id: String,
    /// Product name at time of order (frozen).
    pub product_name: String,
    /// SKU at time of order (frozen).
    pub sku: String,
    /// Unit of measure at time of order (frozen).
    pub unit: String,
    pub quantity: i64,
    /// Unit price in paise at time of order (frozen).
    pub unit_price_paise: i64,
    pub discount_paise: i64,
    pub tax_rate_bps: u32,
    pub gst_paise: i64,
    /// quantity × unit_price − discount + gst
    pub total_paise: i64,
}

impl OrderItem {
    /// Builds the stored line from a priced line.
    pub fn from_priced(
        id: impl Into<String>,
        order_id: impl Into<String>,
        line_no: i64,
        line: &PricedLine,
    ) -> Self {
        OrderItem {
            id: id.into(),
            order_id: order_id.into(),
            line_no,
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            sku: line.sku.clone(),
            unit: line.unit.clone(),
            quantity: line.quantity,
            unit_price_paise: line.unit_price.paise(),
            discount_paise: line.discount.paise(),
            tax_rate_bps: line.tax_rate.bps(),
            gst_paise: line.gst.paise(),
            total_paise: line.line_total.paise(),
        }
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Optional details attached to a stock movement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementMetadata {
    /// Purchase or valuation price per unit, in paise.
    pub unit_price_paise: Option<i64>,
    pub supplier_name: Option<String>,
    pub supplier_contact: Option<String>,
    /// Supplier invoice or delivery note number.
    pub supplier_reference: Option<String>,
    pub note: Option<String>,
    /// The entity that caused the movement (an order id for sales).
    pub reference_id: Option<String>,
}

/// An immutable entry in a product's stock ledger.
///
/// `quantity` is what was requested; `new_stock - previous_stock` is what
/// actually happened. The two differ only when a decrease was clamped at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    /// 1-based position in the product's ledger.
    pub ledger_seq: i64,
    pub kind: MovementKind,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub unit_price_paise: Option<i64>,
    /// unit_price × quantity, when a unit price was given.
    pub total_value_paise: Option<i64>,
    pub supplier_name: Option<String>,
    pub supplier_contact: Option<String>,
    pub supplier_reference: Option<String>,
    pub note: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Signed change actually applied to on-hand stock.
    #[inline]
    pub fn applied_delta(&self) -> i64 {
        self.new_stock - self.previous_stock
    }

    /// True when a decrease asked for more than was on hand.
    pub fn was_clamped(&self) -> bool {
        self.kind.is_decrease() && self.previous_stock - self.new_stock < self.quantity
    }
}

// =============================================================================
// Paging
// =============================================================================

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    /// Rows matching the filter across all pages.
    pub total: i64,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self) -> i64 {
        if self.page_size == 0 {
            return 0;
        }
        (self.total + self.page_size as i64 - 1) / self.page_size as i64
    }
}

/// Stock position of one product, derived from its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub on_hand: i64,
    pub available: bool,
    pub movement_count: i64,
    pub last_movement_at: Option<DateTime<Utc>>,
}

/// Stock position of the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub products: Vec<ProductStock>,
    /// On-hand summed over active products, saturating at `i64::MAX`.
    pub total_units: i64,
    pub out_of_stock: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
