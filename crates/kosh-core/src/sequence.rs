//! # Sequence Identifiers
//!
//! Human-readable order and invoice numbers.
//!
//! ```text
//!   ORD 2026 10 0001
//!   ─┬─ ──┬─ ┬─ ──┬─
//!    │    │  │    └── ordinal within scope + month (min 4 digits, widens)
//!    │    │  └─────── month (UTC)
//!    │    └────────── year (UTC)
//!    └─────────────── scope prefix (ORD / INV)
//! ```
//!
//! This module only formats and parses. Minting the ordinal is an atomic
//! counter increment in `kosh-db`; ordinals are never reused.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::SEQUENCE_ORDINAL_WIDTH;

/// Which identifier family a number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceScope {
    Order,
    Invoice,
}

impl SequenceScope {
    pub const fn prefix(&self) -> &'static str {
        match self {
            SequenceScope::Order => "ORD",
            SequenceScope::Invoice => "INV",
        }
    }

    /// Key stored in the counter table.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SequenceScope::Order => "order",
            SequenceScope::Invoice => "invoice",
        }
    }
}

impl fmt::Display for SequenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            });
        }
        if !(0..=9999).contains(&year) {
            return Err(ValidationError::OutOfRange {
                field: "year".to_string(),
                min: 0,
                max: 9999,
            });
        }
        Ok(Period { year, month })
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Period {
            year: at.year(),
            month: at.month(),
        }
    }

    /// `YYYYMM`, the period column of the counter table.
    pub fn key(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Formats an identifier from its parts.
///
/// ## Example
/// ```rust
/// use kosh_core::sequence::{format_identifier, Period, SequenceScope};
///
/// let period = Period::new(2026, 10).unwrap();
/// assert_eq!(format_identifier(SequenceScope::Order, period, 1), "ORD2026100001");
/// assert_eq!(format_identifier(SequenceScope::Invoice, period, 12345), "INV20261012345");
/// ```
pub fn format_identifier(scope: SequenceScope, period: Period, ordinal: u64) -> String {
    format!(
        "{}{}{:0width$}",
        scope.prefix(),
        period.key(),
        ordinal,
        width = SEQUENCE_ORDINAL_WIDTH
    )
}

/// Splits an identifier back into scope, period and ordinal.
pub fn parse_identifier(identifier: &str) -> Result<(SequenceScope, Period, u64), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "identifier".to_string(),
        reason: reason.to_string(),
    };

    let scope = if identifier.starts_with(SequenceScope::Order.prefix()) {
        SequenceScope::Order
    } else if identifier.starts_with(SequenceScope::Invoice.prefix()) {
        SequenceScope::Invoice
    } else {
        return Err(invalid("unknown prefix"));
    };

    let rest = &identifier[scope.prefix().len()..];
    if rest.len() < 6 + SEQUENCE_ORDINAL_WIDTH || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected YYYYMM followed by an ordinal"));
    }

    let year: i32 = rest[..4].parse().map_err(|_| invalid("bad year"))?;
    let month: u32 = rest[4..6].parse().map_err(|_| invalid("bad month"))?;
    let ordinal: u64 = rest[6..].parse().map_err(|_| invalid("bad ordinal"))?;

    if ordinal == 0 {
        return Err(invalid("ordinal starts at 1"));
    }

    let period = Period::new(year, month)?;
    Ok((scope, period, ordinal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_from_datetime() {
        let at = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap();
        let period = Period::from_datetime(at);
        assert_eq!(period.key(), "202603");
        assert_eq!(period.to_string(), "2026-03");
    }

    #[test]
    fn test_format_pads_to_four_digits() {
        let period = Period::new(2026, 10).unwrap();
        assert_eq!(format_identifier(SequenceScope::Order, period, 7), "ORD2026100007");
        assert_eq!(format_identifier(SequenceScope::Invoice, period, 9999), "INV2026109999");
    }

    #[test]
    fn test_format_widens_past_9999() {
        let period = Period::new(2026, 10).unwrap();
        assert_eq!(format_identifier(SequenceScope::Order, period, 10_000), "ORD20261010000");
    }

    #[test]
    fn test_parse_identifier() {
        let (scope, period, ordinal) = parse_identifier("INV2026100042").unwrap();
        assert_eq!(scope, SequenceScope::Invoice);
        assert_eq!(period, Period::new(2026, 10).unwrap());
        assert_eq!(ordinal, 42);

        let (_, _, ordinal) = parse_identifier("ORD20261010000").unwrap();
        assert_eq!(ordinal, 10_000);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_identifier("XYZ2026100001").is_err());
        assert!(parse_identifier("ORD202610").is_err());
        assert!(parse_identifier("ORD2026130001").is_err());
        assert!(parse_identifier("ORD2026100000").is_err());
        assert!(parse_identifier("ORD20261000a1").is_err());
    }

    #[test]
    fn test_invalid_period() {
        assert!(Period::new(2026, 0).is_err());
        assert!(Period::new(2026, 13).is_err());
    }
}
