use std::fmt;

use serde::{Deserialize, Serialize};

/// Why an authorization check came back negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The acting account is deactivated.
    AccountInactive,
    /// No gate is registered under the requested ability.
    UnknownAbility,
    /// The gate's permission check failed.
    PermissionDenied,
    /// The request would hand out or touch super-admin power without holding it.
    PrivilegeEscalationBlocked,
    /// Reserved role, or a role still held by users.
    ReferentialIntegrityBlocked,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::AccountInactive => "account_inactive",
            DenyReason::UnknownAbility => "unknown_ability",
            DenyReason::PermissionDenied => "permission_denied",
            DenyReason::PrivilegeEscalationBlocked => "privilege_escalation_blocked",
            DenyReason::ReferentialIntegrityBlocked => "referential_integrity_blocked",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    /// `Allow` when `granted`, otherwise a generic permission denial.
    pub fn from_bool(granted: bool) -> Self {
        if granted {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::PermissionDenied)
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }

    /// Runs `next` only when this decision allows; a denial short-circuits.
    pub fn and_then(self, next: impl FnOnce() -> Decision) -> Decision {
        match self {
            Decision::Allow => next(),
            deny => deny,
        }
    }
}
