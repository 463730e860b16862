//! The authenticated caller and the role gate every service call goes through.

use common::{Role, UserId};

use crate::error::DomainError;

/// Who is making a request.
///
/// Passed explicitly to every service operation; nothing in the domain reads
/// ambient identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Fails with `Forbidden` unless the caller holds at least `minimum`.
    pub fn require(&self, minimum: Role, action: &str) -> Result<(), DomainError> {
        if self.role.is_at_least(minimum) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "{minimum} role or higher required to {action}"
            )))
        }
    }

    pub fn is(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Read access to a count created by `created_by`.
    pub fn can_view_count(&self, created_by: UserId) -> bool {
        self.is(created_by) || self.role.sees_all_counts()
    }

    /// Line edits and deletion of a draft created by `created_by`.
    pub fn can_edit_count(&self, created_by: UserId) -> bool {
        self.is(created_by) || self.role.can_review()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_checks_ordering() {
        let manager = Caller::new(UserId::new(), Role::Manager);
        assert!(manager.require(Role::Manager, "review counts").is_ok());
        assert!(manager.require(Role::Counter, "list counts").is_ok());

        let err = manager.require(Role::Admin, "manage users").unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(msg) if msg.contains("admin")));
    }

    #[test]
    fn staff_only_sees_own_counts() {
        let staff = Caller::new(UserId::new(), Role::Staff);
        assert!(staff.can_view_count(staff.user_id));
        assert!(!staff.can_view_count(UserId::new()));

        let counter = Caller::new(UserId::new(), Role::Counter);
        assert!(counter.can_view_count(UserId::new()));
        assert!(!counter.can_edit_count(UserId::new()));
    }

    #[test]
    fn managers_edit_any_draft() {
        let manager = Caller::new(UserId::new(), Role::Manager);
        assert!(manager.can_edit_count(UserId::new()));
    }
}
