//! # Stock Ledger Rules
//!
//! The arithmetic of stock movements. A product's quantity on hand is never
//! stored on its own; it is the `new_stock` of the product's latest
//! movement, or equivalently a fold over the whole history.
//!
//! ## Delta Rule
//! ```text
//! ┌──────────────┬───────────┬──────────────────────────────────────────┐
//! │ kind         │ direction │ new_stock                                │
//! ├──────────────┼───────────┼──────────────────────────────────────────┤
//! │ stock_in     │    +      │ previous + quantity                      │
//! │ return       │    +      │ previous + quantity                      │
//! │ stock_out    │    −      │ max(0, previous − quantity)              │
//! │ adjustment   │    −      │ max(0, previous − quantity)              │
//! │ damage       │    −      │ max(0, previous − quantity)              │
//! └──────────────┴───────────┴──────────────────────────────────────────┘
//! ```
//!
//! Decreases past zero are clamped, not rejected: the movement is still
//! recorded with the requested quantity and `new_stock = 0`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::StockMovement;

// =============================================================================
// Movement Kind
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    StockIn,
    StockOut,
    /// Manual correction; always reduces stock.
    Adjustment,
    Return,
    Damage,
}

impl MovementKind {
    pub const ALL: [MovementKind; 5] = [
        MovementKind::StockIn,
        MovementKind::StockOut,
        MovementKind::Adjustment,
        MovementKind::Return,
        MovementKind::Damage,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementKind::StockIn => "stock_in",
            MovementKind::StockOut => "stock_out",
            MovementKind::Adjustment => "adjustment",
            MovementKind::Return => "return",
            MovementKind::Damage => "damage",
        }
    }

    #[inline]
    pub const fn is_increase(&self) -> bool {
        matches!(self, MovementKind::StockIn | MovementKind::Return)
    }

    #[inline]
    pub const fn is_decrease(&self) -> bool {
        !self.is_increase()
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = MovementKind::ALL.iter().map(|k| k.as_str()).collect();
                ValidationError::not_allowed("kind", &allowed)
            })
    }
}

// =============================================================================
// Applying a Movement
// =============================================================================

/// Result of applying one movement to a stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockEffect {
    pub previous_stock: i64,
    /// Quantity as requested (stored on the movement).
    pub requested: i64,
    pub new_stock: i64,
}

impl StockEffect {
    /// True when a decrease asked for more than was on hand.
    pub fn clamped(&self) -> bool {
        // increases never end at zero since requested > 0
        self.new_stock == 0 && self.previous_stock < self.requested
    }

    /// Units actually removed (decreases) or added (increases).
    pub fn applied(&self) -> i64 {
        (self.new_stock - self.previous_stock).abs()
    }
}

/// Applies the delta rule.
///
/// ## Errors
/// - `quantity <= 0` → `InvalidQuantity`
/// - `previous < 0` → `LedgerInconsistent` (a ledger never goes negative)
///
/// ## Example
/// ```rust
/// use kosh_core::ledger::{apply_movement, MovementKind};
///
/// let effect = apply_movement(4, MovementKind::StockOut, 10).unwrap();
/// assert_eq!(effect.previous_stock, 4);
/// assert_eq!(effect.requested, 10);
/// assert_eq!(effect.new_stock, 0);
/// ```
pub fn apply_movement(previous: i64, kind: MovementKind, quantity: i64) -> CoreResult<StockEffect> {
    if quantity <= 0 {
        return Err(CoreError::InvalidQuantity { quantity });
    }

    if previous < 0 {
        return Err(CoreError::LedgerInconsistent {
            product_id: String::new(),
            ledger_seq: 0,
            reason: format!("previous stock {previous} is negative"),
        });
    }

    let new_stock = if kind.is_increase() {
        previous
            .checked_add(quantity)
            .ok_or(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: i64::MAX - previous,
            })?
    } else {
        (previous - quantity).max(0)
    };

    Ok(StockEffect {
        previous_stock: previous,
        requested: quantity,
        new_stock,
    })
}

/// On-hand quantity after replaying `(kind, quantity)` pairs from zero.
pub fn fold_on_hand<I>(movements: I) -> CoreResult<i64>
where
    I: IntoIterator<Item = (MovementKind, i64)>,
{
    movements
        .into_iter()
        .try_fold(0, |on_hand, (kind, qty)| {
            apply_movement(on_hand, kind, qty).map(|e| e.new_stock)
        })
}

// =============================================================================
// Chain Verification
// =============================================================================

/// Checks a product's full ledger, ordered by `ledger_seq`.
///
/// Every entry must sit at the next position, start from its predecessor's
/// `new_stock` (0 for the first) and end where the delta rule says.
/// Returns the on-hand quantity.
pub fn verify_chain(product_id: &str, movements: &[StockMovement]) -> CoreResult<i64> {
    let mut on_hand = 0;

    for (index, movement) in movements.iter().enumerate() {
        let broken = |reason: String| CoreError::LedgerInconsistent {
            product_id: product_id.to_string(),
            ledger_seq: movement.ledger_seq,
            reason,
        };

        if movement.product_id != product_id {
            return Err(broken(format!("belongs to product {}", movement.product_id)));
        }

        let expected_seq = index as i64 + 1;
        if movement.ledger_seq != expected_seq {
            return Err(broken(format!("expected position {expected_seq}")));
        }

        if movement.previous_stock != on_hand {
            return Err(broken(format!(
                "previous_stock {} does not match prior new_stock {}",
                movement.previous_stock, on_hand
            )));
        }

        let effect = apply_movement(on_hand, movement.kind, movement.quantity)
            .map_err(|e| broken(e.to_string()))?;

        if effect.new_stock != movement.new_stock {
            return Err(broken(format!(
                "new_stock {} but {} {} from {} gives {}",
                movement.new_stock, movement.kind, movement.quantity, on_hand, effect.new_stock
            )));
        }

        on_hand = movement.new_stock;
    }

    Ok(on_hand)
}
