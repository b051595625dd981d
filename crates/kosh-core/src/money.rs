//! # Money Module
//!
//! Provides the `Money` type for handling rupee amounts safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Summed over hundreds of invoice lines the drift shows up as a          │
//! │  grand total that no longer equals subtotal + GST.                      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise                                            │
//! │    ₹58.00 × 10 = 5800 paise × 10 = 58000 paise                         │
//! │    GST 18% = (58000 × 1800 + 5000) / 10000 = 10440 paise                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kosh_core::money::Money;
//!
//! let price = Money::from_paise(6_500_000); // ₹65,000.00
//! let line = price * 2;                     // ₹1,30,000.00
//! assert_eq!(line.rupees(), 130_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in paise (1/100 rupee).
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values represent credit (overpayment)
/// - **Single field tuple struct**: zero-cost over i64
/// - **Serialized as a bare integer**: `{"grand_total_paise": 15408440}`
///
/// ```text
/// Product.price_paise ──► OrderItem.unit_price ──► OrderItem.total
///                                                        │
///       Order.subtotal ◄─────────────────────────────────┘
///            │
///            ▼
///       + GST ──► Order.grand_total ──► amount_due = grand_total − paid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use kosh_core::money::Money;
    ///
    /// let price = Money::from_paise(5800); // ₹58.00
    /// assert_eq!(price.paise(), 5800);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Creates a Money value from rupees and paise.
    ///
    /// ## Example
    /// ```rust
    /// use kosh_core::money::Money;
    ///
    /// assert_eq!(Money::from_rupees_paise(23_504, 40).paise(), 2_350_440);
    /// assert_eq!(Money::from_rupees_paise(-5, 50).paise(), -550);
    /// ```
    ///
    /// ## Note
    /// For negative amounts only the rupee part carries the sign.
    #[inline]
    pub const fn from_rupees_paise(rupees: i64, paise: i64) -> Self {
        if rupees < 0 {
            Money(rupees * 100 - paise)
        } else {
            Money(rupees * 100 + paise)
        }
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole rupee portion (truncated toward zero).
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Calculates tax rounded half-up to the nearest paisa.
    ///
    /// ## Rounding
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  ROUND HALF UP (away from zero)                                     │
    /// │                                                                     │
    /// │  raw = amount × bps / 10000                                         │
    /// │    104.40 paise → 104 paise       (below half, down)               │
    /// │    104.50 paise → 105 paise       (half, up)                       │
    /// │                                                                     │
    /// │  Integer form: (|amount| × bps + 5000) / 10000, sign restored       │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use kosh_core::money::Money;
    /// use kosh_core::types::TaxRate;
    ///
    /// let line = Money::from_paise(13_000_000); // ₹1,30,000.00
    /// let gst = line.calculate_tax(TaxRate::from_bps(1800));
    /// assert_eq!(gst.paise(), 2_340_000);       // ₹23,400.00
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 keeps large order lines from overflowing the multiplication
        let magnitude = (self.0 as i128).abs() * rate.bps() as i128;
        let rounded = (magnitude + 5000) / 10000;
        let signed = if self.0 < 0 { -rounded } else { rounded };
        Money::from_paise(signed as i64)
    }

    /// Multiplies money by a quantity, failing instead of wrapping.
    #[inline]
    pub fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    #[inline]
    pub fn checked_sub(&self, other: Money) -> Option<Self> {
        self.0.checked_sub(other.0).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows rupees with Indian digit grouping, e.g. `₹1,54,084.40`.
///
/// ## Note
/// For logs and error messages. Invoices are rendered by their consumers.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.rupees().abs().to_string();

        // Last three digits, then groups of two: 1,54,084
        let grouped = if digits.len() <= 3 {
            digits
        } else {
            let (head, tail) = digits.split_at(digits.len() - 3);
            let mut groups: Vec<&str> = Vec::new();
            let mut end = head.len();
            while end > 0 {
                let start = end.saturating_sub(2);
                groups.push(&head[start..end]);
                end = start;
            }
            groups.reverse();
            format!("{},{}", groups.join(","), tail)
        };

        write!(f, "{}₹{}.{:02}", sign, grouped, self.paise_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
