//! # Payment & Order State Machines
//!
//! ## Payment Status
//! A pure function of `(amount_paid, grand_total)`; it is recomputed on
//! every update and can never be set directly.
//!
//! ```text
//!   amount_paid ≤ 0            → pending
//!   0 < amount_paid < total    → partial
//!   amount_paid ≥ total        → paid      (overpayment = negative amount_due)
//! ```
//!
//! ## Order Status
//! ```text
//!   ┌───────┐     ┌───────────┐     ┌────────────┐     ┌───────────┐
//!   │ draft │────►│ confirmed │────►│ processing │────►│ completed │
//!   └───┬───┘     └─────┬─────┘     └──────┬─────┘     └───────────┘
//!       │               │  issue_invoice   │  issue_invoice   ▲
//!       │               └──────────────────┼──────────────────┘
//!       │               │                  │
//!       ▼               ▼                  ▼
//!   ┌─────────────────────────────────────────┐
//!   │                cancelled                │
//!   └─────────────────────────────────────────┘
//! ```
//!
//! `completed` is reached only by issuing an invoice; `completed` and
//! `cancelled` are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::Order;

// =============================================================================
// Payment Status
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// Derives the status from the amounts.
    ///
    /// ## Example
    /// ```rust
    /// use kosh_core::lifecycle::PaymentStatus;
    ///
    /// assert_eq!(PaymentStatus::from_amounts(0, 100), PaymentStatus::Pending);
    /// assert_eq!(PaymentStatus::from_amounts(50, 100), PaymentStatus::Partial);
    /// assert_eq!(PaymentStatus::from_amounts(150, 100), PaymentStatus::Paid);
    /// ```
    pub fn from_amounts(amount_paid_paise: i64, grand_total_paise: i64) -> Self {
        if amount_paid_paise >= grand_total_paise {
            PaymentStatus::Paid
        } else if amount_paid_paise > 0 {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Status
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    Processing,
    Completed,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Draft
    }
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Draft,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether an invoice may be issued from this status.
    #[inline]
    pub const fn is_invoiceable(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Processing)
    }

    /// Transition table. A same-status move is not a transition.
    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Draft, Confirmed)
                | (Confirmed, Processing)
                | (Confirmed, Completed)
                | (Processing, Completed)
                | (Draft, Cancelled)
                | (Confirmed, Cancelled)
                | (Processing, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = OrderStatus::ALL.iter().map(|st| st.as_str()).collect();
                ValidationError::not_allowed("status", &allowed)
            })
    }
}

// =============================================================================
// Order Transitions
// =============================================================================

/// Checks a status change requested through a payment update.
///
/// `completed` is refused here: only invoice issuance completes an order.
pub fn ensure_manual_transition(order: &Order, next: OrderStatus) -> CoreResult<()> {
    if next == OrderStatus::Completed || !order.status.can_transition_to(next) {
        return Err(CoreError::InvalidStatusTransition {
            order_number: order.order_number.clone(),
            from: order.status.to_string(),
            to: next.to_string(),
        });
    }
    Ok(())
}

/// Checks that an invoice may be issued for the order.
///
/// ## Errors
/// - invoice number already set → `InvoiceAlreadyIssued`
/// - status not `confirmed`/`processing` → `InvalidStatusTransition`
pub fn ensure_invoiceable(order: &Order) -> CoreResult<()> {
    if let Some(invoice_number) = &order.invoice_number {
        return Err(CoreError::InvoiceAlreadyIssued {
            order_number: order.order_number.clone(),
            invoice_number: invoice_number.clone(),
        });
    }

    if !order.status.is_invoiceable() {
        return Err(CoreError::InvalidStatusTransition {
            order_number: order.order_number.clone(),
            from: order.status.to_string(),
            to: OrderStatus::Completed.to_string(),
        });
    }

    Ok(())
}

/// Refuses payment changes on a cancelled order.
pub fn ensure_payable(order: &Order) -> CoreResult<()> {
    if order.status == OrderStatus::Cancelled {
        return Err(CoreError::InvalidStatusTransition {
            order_number: order.order_number.clone(),
            from: order.status.to_string(),
            to: "payment update".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomerSnapshot, PaymentMethod};
    use chrono::Utc;

    fn order(status: OrderStatus, invoice: Option<&str>) -> Order {
        Order {
            id: "o1".to_string(),
            order_number: "ORD2026100001".to_string(),
            invoice_number: invoice.map(str::to_string),
            customer: CustomerSnapshot::default(),
            items: vec![],
            subtotal_paise: 100,
            total_discount_paise: 0,
            total_gst_paise: 18,
            grand_total_paise: 118,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Pending,
            amount_paid_paise: 0,
            amount_due_paise: 118,
            status,
            notes: None,
            created_by: "u1".to_string(),
            processed_by: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            invoiced_at: None,
        }
    }

    #[test]
    fn test_payment_status_table() {
        assert_eq!(PaymentStatus::from_amounts(0, 100), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_amounts(50, 100), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::from_amounts(100, 100), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_amounts(150, 100), PaymentStatus::Paid);
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        assert!(Draft.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Cancelled));

        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Confirmed));
        assert!(!Draft.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Confirmed));
    }

    #[test]
    fn test_manual_completion_refused() {
        let o = order(OrderStatus::Processing, None);
        assert!(ensure_manual_transition(&o, OrderStatus::Cancelled).is_ok());
        assert!(matches!(
            ensure_manual_transition(&o, OrderStatus::Completed),
            Err(CoreError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_second_invoice_rejected() {
        let o = order(OrderStatus::Completed, Some("INV2026100001"));
        match ensure_invoiceable(&o) {
            Err(CoreError::InvoiceAlreadyIssued { invoice_number, .. }) => {
                assert_eq!(invoice_number, "INV2026100001")
            }
            other => panic!("expected InvoiceAlreadyIssued, got {other:?}"),
        }
    }

    #[test]
    fn test_invoice_requires_open_order() {
        assert!(ensure_invoiceable(&order(OrderStatus::Confirmed, None)).is_ok());
        assert!(ensure_invoiceable(&order(OrderStatus::Processing, None)).is_ok());
        assert!(ensure_invoiceable(&order(OrderStatus::Draft, None)).is_err());
        assert!(ensure_invoiceable(&order(OrderStatus::Cancelled, None)).is_err());
    }

    #[test]
    fn test_cancelled_order_not_payable() {
        assert!(ensure_payable(&order(OrderStatus::Cancelled, None)).is_err());
        assert!(ensure_payable(&order(OrderStatus::Completed, None)).is_ok());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("processing".parse::<OrderStatus>().unwrap(), OrderStatus::Processing);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
