use crate::domain::AccountId;

use super::AppError;

/// The caller's identity, passed explicitly into every operation. There is no
/// ambient "current user" state anywhere in the crate; an anonymous session
/// is rejected by every mutating operation.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    user: Option<AccountId>,
}

impl Session {
    pub fn authenticated(user: AccountId) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }

    /// The authenticated account, or `Unauthenticated` for anonymous callers.
    pub fn require_user(&self) -> Result<AccountId, AppError> {
        self.user.ok_or(AppError::Unauthenticated)
    }
}
