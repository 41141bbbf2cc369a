use super::decision::DenyReason;

pub type AuthzResult<T> = Result<T, AuthzError>;

/// Faults raised by the authorization core and its storage contract.
///
/// A normal denial is not an error when asking `can`/`check`; it only
/// becomes [`AuthzError::Denied`] through `authorize`, where the caller has
/// asked for a hard stop.
#[derive(thiserror::Error, Debug)]
pub enum AuthzError {
    #[error("malformed ability name `{0}`: expected `<resource>.<action>`")]
    MalformedAbility(String),
    #[error("malformed resource name `{0}`")]
    MalformedResource(String),
    #[error("`{ability}` denied: {reason}")]
    Denied { ability: String, reason: DenyReason },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage error")]
    Storage(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl AuthzError {
    pub fn denied(ability: impl Into<String>, reason: DenyReason) -> Self {
        Self::Denied {
            ability: ability.into(),
            reason,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The deny reason when this error is a policy denial.
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            AuthzError::Denied { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
