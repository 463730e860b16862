//! Credential handling: password hashes, password policy and bearer tokens.
//!
//! Nothing here touches the store. Callers look users up themselves and use
//! [`PasswordHasher`] and [`TokenIssuer`] to check and mint credentials.

pub mod error;
pub mod password;
pub mod policy;
pub mod token;

pub use error::{AuthError, Result};
pub use password::{HashParams, PasswordHasher};
pub use policy::validate_password_strength;
pub use token::{Claims, TokenConfig, TokenIssuer, TokenKind, TokenPair, parse_algorithm};
