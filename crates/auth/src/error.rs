use thiserror::Error;

/// Errors raised while hashing passwords or handling tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    /// An access token was presented where a refresh token is required, or
    /// the other way round.
    #[error("Expected a {expected} token")]
    WrongTokenKind { expected: &'static str },

    #[error("{0}")]
    WeakPassword(String),

    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
