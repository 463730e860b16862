//! User accounts: self-registration, login and admin management.

mod service;

pub use service::UserService;

use common::Role;

use crate::error::DomainError;

pub const MAX_EMAIL_LEN: usize = 255;

/// Account to create. `role` is ignored by self-registration.
#[derive(Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Partial account update; `None` leaves a field unchanged.
#[derive(Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

impl std::fmt::Debug for UserChanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserChanges")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .field("password_changed", &self.password.is_some())
            .finish()
    }
}

/// Normalizes and checks an email address.
///
/// Only the shape `local@domain` is checked; deliverability is not.
pub(crate) fn normalize_email(email: &str) -> Result<String, DomainError> {
    let email = email.trim();
    let valid = email.len() <= MAX_EMAIL_LEN
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(DomainError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(email.to_string())
}

pub(crate) fn validate_full_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation("Full name is required".to_string()));
    }
    Ok(())
}
