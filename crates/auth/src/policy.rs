use crate::{AuthError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Checks a new password against the account password policy.
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AuthError::WeakPassword(
            "password must contain at least one lowercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AuthError::WeakPassword(
            "password must contain at least one uppercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword(
            "password must contain at least one digit".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(password: &str) -> String {
        validate_password_strength(password).unwrap_err().to_string()
    }

    #[test]
    fn accepts_strong_password() {
        assert!(validate_password_strength("Secret123").is_ok());
    }

    #[test]
    fn rejects_each_missing_class() {
        assert!(message("Sh0rt").contains("at least 8"));
        assert!(message("SECRET123").contains("lowercase"));
        assert!(message("secret123").contains("uppercase"));
        assert!(message("SecretPass").contains("digit"));
    }
}
