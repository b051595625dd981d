//! # Access Gate
//!
//! Roles are a closed set and each maps to a fixed list of capabilities.
//! Every operation asks one question through [`authorize`].
//!
//! ```text
//! ┌────────────┬────────┬─────────┬───────┬─────────┐
//! │ capability │ admin  │ manager │ staff │ auditor │
//! ├────────────┼────────┼─────────┼───────┼─────────┤
//! │ create     │   ✓    │    ✓    │   ✓   │         │
//! │ view ord.  │   ✓    │    ✓    │   ✓   │    ✓    │
//! │ payment    │   ✓    │    ✓    │   ✓   │         │
//! │ invoice    │   ✓    │    ✓    │       │         │
//! │ rec. stock │   ✓    │    ✓    │   ✓   │         │
//! │ view stock │   ✓    │    ✓    │   ✓   │    ✓    │
//! └────────────┴────────┴─────────┴───────┴─────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Staff,
    Auditor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateOrder,
    ViewOrders,
    UpdatePayment,
    IssueInvoice,
    RecordStock,
    ViewStock,
}

const ADMIN: &[Capability] = &[
    Capability::CreateOrder,
    Capability::ViewOrders,
    Capability::UpdatePayment,
    Capability::IssueInvoice,
    Capability::RecordStock,
    Capability::ViewStock,
];

const MANAGER: &[Capability] = ADMIN;

const STAFF: &[Capability] = &[
    Capability::CreateOrder,
    Capability::ViewOrders,
    Capability::UpdatePayment,
    Capability::RecordStock,
    Capability::ViewStock,
];

const AUDITOR: &[Capability] = &[Capability::ViewOrders, Capability::ViewStock];

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Staff, Role::Auditor];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
            Role::Auditor => "auditor",
        }
    }

    pub const fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Admin => ADMIN,
            Role::Manager => MANAGER,
            Role::Staff => STAFF,
            Role::Auditor => AUDITOR,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Role::ALL.into_iter().find(|r| r.as_str() == s).ok_or_else(|| {
            let allowed: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
            ValidationError::not_allowed("role", &allowed)
        })
    }
}

impl Capability {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateOrder => "create_order",
            Capability::ViewOrders => "view_orders",
            Capability::UpdatePayment => "update_payment",
            Capability::IssueInvoice => "issue_invoice",
            Capability::RecordStock => "record_stock",
            Capability::ViewStock => "view_stock",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is calling: identity from the external auth service plus its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Caller {
            user_id: user_id.into(),
            role,
        }
    }

    /// Shorthand for [`authorize`] with this caller's role.
    pub fn require(&self, capability: Capability) -> CoreResult<()> {
        authorize(self.role, capability)
    }
}

/// The single authorization check.
///
/// ## Example
/// ```rust
/// use kosh_core::access::{authorize, Capability, Role};
///
/// assert!(authorize(Role::Manager, Capability::IssueInvoice).is_ok());
/// assert!(authorize(Role::Staff, Capability::IssueInvoice).is_err());
/// ```
pub fn authorize(role: Role, capability: Capability) -> CoreResult<()> {
    if role.can(capability) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            role: role.to_string(),
            capability: capability.to_string(),
        })
    }
}
