//! # Order Total Calculator
//!
//! Turns requested `(product, quantity)` pairs into priced line records and
//! order aggregates.
//!
//! ## Pricing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LineRequest { product_id, quantity }                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CatalogLookup::find_product ──► missing / inactive → ProductNotFound   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  item_total = unit_price × quantity                                     │
//! │  gst        = round_half_up(item_total × 1800 / 10000)                  │
//! │  line_total = item_total − discount + gst                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  OrderTotals { subtotal, total_discount, total_gst, grand_total }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices are read once, here; the priced lines are then frozen onto the
//! order as snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Product, TaxRate};

// =============================================================================
// Catalog Lookup
// =============================================================================

/// Read access to current product prices.
///
/// The database layer implements this with a map loaded inside the order
/// transaction; tests use a plain `HashMap`.
pub trait CatalogLookup {
    fn find_product(&self, product_id: &str) -> Option<&Product>;
}

impl CatalogLookup for HashMap<String, Product> {
    fn find_product(&self, product_id: &str) -> Option<&Product> {
        self.get(product_id)
    }
}

// =============================================================================
// Line Types
// =============================================================================

/// One requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        LineRequest {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A line after pricing, carrying the product snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub sku: String,
    pub unit: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,
    pub tax_rate: TaxRate,
    pub gst: Money,
    pub line_total: Money,
}

impl PricedLine {
    /// quantity × unit_price − discount, `None` if it leaves the i64 range.
    #[inline]
    pub fn net_amount(&self) -> Option<Money> {
        self.unit_price
            .checked_multiply_quantity(self.quantity)?
            .checked_sub(self.discount)
    }
}

fn total_out_of_range(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

// =============================================================================
// Order Totals
// =============================================================================

/// Order-level aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub total_discount: Money,
    pub total_gst: Money,
    pub grand_total: Money,
}

impl OrderTotals {
    /// Aggregates a set of priced lines.
    ///
    /// `grand_total = subtotal + total_gst`. The discount is already inside
    /// `subtotal` and is not subtracted a second time.
    ///
    /// ## Errors
    /// Any sum that leaves the i64 range → `OutOfRange` on that field.
    pub fn from_lines(lines: &[PricedLine]) -> CoreResult<Self> {
        let mut totals = OrderTotals::default();

        for line in lines {
            let net = line
                .net_amount()
                .ok_or_else(|| total_out_of_range("subtotal"))?;
            totals.subtotal = totals
                .subtotal
                .checked_add(net)
                .ok_or_else(|| total_out_of_range("subtotal"))?;
            totals.total_discount = totals
                .total_discount
                .checked_add(line.discount)
                .ok_or_else(|| total_out_of_range("total_discount"))?;
            totals.total_gst = totals
                .total_gst
                .checked_add(line.gst)
                .ok_or_else(|| total_out_of_range("total_gst"))?;
        }

        totals.grand_total = totals
            .subtotal
            .checked_add(totals.total_gst)
            .ok_or_else(|| total_out_of_range("grand_total"))?;

        Ok(totals)
    }

    /// Recomputes the aggregates from `lines` and fails on any disagreement.
    ///
    /// Also checks each line's own total, so a corrupted line cannot hide
    /// behind matching sums.
    pub fn verify(&self, lines: &[PricedLine]) -> CoreResult<()> {
        for line in lines {
            let expected = line
                .net_amount()
                .and_then(|net| net.checked_add(line.gst))
                .ok_or_else(|| total_out_of_range("line_total"))?;
            if line.line_total != expected {
                return Err(CoreError::TotalsMismatch {
                    field: "line_total",
                    expected: expected.paise(),
                    actual: line.line_total.paise(),
                });
            }
        }

        let recomputed = OrderTotals::from_lines(lines)?;
        let checks = [
            ("subtotal", recomputed.subtotal, self.subtotal),
            ("total_discount", recomputed.total_discount, self.total_discount),
            ("total_gst", recomputed.total_gst, self.total_gst),
            ("grand_total", recomputed.grand_total, self.grand_total),
        ];

        for (field, expected, actual) in checks {
            if expected != actual {
                return Err(CoreError::TotalsMismatch {
                    field,
                    expected: expected.paise(),
                    actual: actual.paise(),
                });
            }
        }

        Ok(())
    }
}

/// Priced lines plus their aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub totals: OrderTotals,
}

// =============================================================================
// Pricing
// =============================================================================

/// Prices a list of requested lines against the current catalog.
///
/// ## Errors
/// - empty `items` → `Validation(Required { field: "items" })`
/// - quantity ≤ 0 → `InvalidQuantity`
/// - unknown or inactive product → `ProductNotFound`
///
/// ## Example
/// ```rust
/// use std::collections::HashMap;
/// use chrono::Utc;
/// use kosh_core::pricing::{price_order, LineRequest};
/// use kosh_core::types::{Product, TaxRate};
///
/// let mut catalog = HashMap::new();
/// catalog.insert("p1".to_string(), Product {
///     id: "p1".into(), sku: "CEM-50".into(), name: "Cement 50kg".into(),
///     category: None, unit: "bag".into(), price_paise: 5800,
///     is_active: true, created_at: Utc::now(), updated_at: Utc::now(),
/// });
///
/// let priced = price_order(&[LineRequest::new("p1", 10)], &catalog, TaxRate::GST_STANDARD).unwrap();
/// assert_eq!(priced.totals.grand_total.paise(), 68_440);
/// ```
pub fn price_order<C>(items: &[LineRequest], catalog: &C, rate: TaxRate) -> CoreResult<PricedOrder>
where
    C: CatalogLookup + ?Sized,
{
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }

    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity <= 0 {
            return Err(CoreError::InvalidQuantity {
                quantity: item.quantity,
            });
        }

        let product = catalog
            .find_product(&item.product_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

        let item_total = product
            .price()
            .checked_multiply_quantity(item.quantity)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: i64::MAX / product.price_paise.max(1),
            })?;

        let discount = Money::zero();
        let taxable = item_total - discount;
        let gst = taxable.calculate_tax(rate);

        lines.push(PricedLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            sku: product.sku.clone(),
            unit: product.unit.clone(),
            quantity: item.quantity,
            unit_price: product.price(),
            discount,
            tax_rate: rate,
            gst,
            line_total: taxable
                .checked_add(gst)
                .ok_or_else(|| total_out_of_range("line_total"))?,
        });
    }

    let totals = OrderTotals::from_lines(&lines)?;
    Ok(PricedOrder { lines, totals })
}

// =============================================================================
// Unit Tests
// =============================================================================
