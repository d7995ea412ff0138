//! The verified caller identity.

use crate::error::{AuthError, Result};
use serde::{Deserialize, Serialize};
use shuttle_core::UserId;

/// What a caller is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// A rider: may hold a QR credential and read their own rides.
    User,
    /// An operator: scans QR codes, drives routes, manages counters.
    Admin,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

/// An already-authenticated caller.
///
/// Produced once at the edge (bearer validation) and passed explicitly into
/// every operation that needs to know who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Account ID.
    pub user_id: UserId,
    /// Account email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Granted role.
    pub role: Role,
}

impl Caller {
    /// Whether the caller is an operator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail unless the caller is an operator.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] for non-operators.
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                required: Role::Admin.as_str().to_string(),
            })
        }
    }
}
