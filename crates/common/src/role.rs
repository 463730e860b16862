use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// Privilege level of a user account.
///
/// Variants are declared from least to most privileged so the derived
/// ordering doubles as the privilege ordering: `Staff < Counter < Manager < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Staff,
    Counter,
    Manager,
    Admin,
}

impl Role {
    /// All roles, least privileged first.
    pub const ALL: [Role; 4] = [Role::Staff, Role::Counter, Role::Manager, Role::Admin];

    /// Returns true if this role grants at least the privileges of `minimum`.
    pub fn is_at_least(&self, minimum: Role) -> bool {
        *self >= minimum
    }

    /// Managers and admins may approve or reject submitted counts.
    pub fn can_review(&self) -> bool {
        self.is_at_least(Role::Manager)
    }

    /// Counters and above see every count, not only their own.
    pub fn sees_all_counts(&self) -> bool {
        self.is_at_least(Role::Counter)
    }

    /// Only admins manage user accounts.
    pub fn can_manage_users(&self) -> bool {
        self.is_at_least(Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Counter => "counter",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("role", s))
    }
}
