use chrono::{Duration, Utc};
use common::UserId;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{AuthError, Result};

/// Which of the two token flavours a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// An access/refresh pair as handed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Signing settings for [`TokenIssuer`].
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            access_ttl: Duration::minutes(30),
            refresh_ttl: Duration::days(7),
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Parses an HMAC algorithm name. Only the shared-secret algorithms are
/// supported.
pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
    match name.to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(AuthError::UnsupportedAlgorithm(name.to_string())),
    }
}

/// Issues and validates signed bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    config: TokenConfig,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            config,
        }
    }

    pub fn issue_access_token(&self, subject: UserId) -> Result<String> {
        self.issue(subject, TokenKind::Access, self.config.access_ttl)
    }

    pub fn issue_refresh_token(&self, subject: UserId) -> Result<String> {
        self.issue(subject, TokenKind::Refresh, self.config.refresh_ttl)
    }

    pub fn issue_pair(&self, subject: UserId) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(subject)?,
            refresh_token: self.issue_refresh_token(subject)?,
            token_type: "bearer".to_string(),
        })
    }

    fn issue(&self, subject: UserId, kind: TokenKind, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(
            &Header::new(self.config.algorithm),
            &claims,
            &self.encoding,
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validates signature, expiry and kind, returning the subject.
    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<UserId> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?
            .claims;

        if claims.kind != expected {
            return Err(AuthError::WrongTokenKind {
                expected: expected.as_str(),
            });
        }

        claims.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(TokenConfig::new("test-secret"))
    }

    #[test]
    fn access_token_round_trip() {
        let issuer = issuer();
        let user = UserId::new();
        let token = issuer.issue_access_token(user).unwrap();

        assert_eq!(issuer.validate(&token, TokenKind::Access).unwrap(), user);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let issuer = issuer();
        let pair = issuer.issue_pair(UserId::new()).unwrap();
        assert_eq!(pair.token_type, "bearer");

        assert!(matches!(
            issuer.validate(&pair.refresh_token, TokenKind::Access),
            Err(AuthError::WrongTokenKind { expected: "access" })
        ));
        assert!(matches!(
            issuer.validate(&pair.access_token, TokenKind::Refresh),
            Err(AuthError::WrongTokenKind { expected: "refresh" })
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut config = TokenConfig::new("test-secret");
        config.access_ttl = Duration::seconds(-30);
        let issuer = TokenIssuer::new(config);

        let token = issuer.issue_access_token(UserId::new()).unwrap();
        assert!(matches!(
            issuer.validate(&token, TokenKind::Access),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = issuer().issue_access_token(UserId::new()).unwrap();
        let other = TokenIssuer::new(TokenConfig::new("another-secret"));

        assert!(matches!(
            other.validate(&token, TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            other.validate("not.a.token", TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn algorithm_names() {
        assert_eq!(parse_algorithm("HS256").unwrap(), Algorithm::HS256);
        assert_eq!(parse_algorithm("hs512").unwrap(), Algorithm::HS512);
        assert!(parse_algorithm("RS256").is_err());
    }

    #[test]
    fn configured_algorithm_is_enforced() {
        let mut config = TokenConfig::new("test-secret");
        config.algorithm = Algorithm::HS512;
        let hs512 = TokenIssuer::new(config);

        let token = hs512.issue_access_token(UserId::new()).unwrap();
        assert!(hs512.validate(&token, TokenKind::Access).is_ok());
        assert!(issuer().validate(&token, TokenKind::Access).is_err());
    }
}
