//! Application configuration loaded from environment variables.

use auth::{TokenConfig, parse_algorithm};
use chrono::Duration;
use thiserror::Error;

const DEV_SECRET: &str = "dev-secret-change-me";

const DEV_ORIGINS: [&str; 5] = [
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:3001",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{0} must be set when a database is configured")]
    Missing(&'static str),
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Admin account created at start-up when no account with the email exists.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST` / `PORT`: bind address (default `0.0.0.0:8000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `pretty` or `json`
/// - `DATABASE_URL`, or `DATABASE_USER` / `DATABASE_PASSWORD` / `DATABASE_HOST` /
///   `DATABASE_PORT` / `DATABASE_NAME`; unset means the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` (default `10`)
/// - `SECRET_KEY`, `ALGORITHM`, `ACCESS_TOKEN_EXPIRE_MINUTES`, `REFRESH_TOKEN_EXPIRE_DAYS`
/// - `FRONTEND_URL`, `ALLOWED_ORIGINS` (comma separated)
/// - `BOOTSTRAP_ADMIN_EMAIL` / `BOOTSTRAP_ADMIN_PASSWORD` / `BOOTSTRAP_ADMIN_NAME`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database: Option<DatabaseConfig>,
    pub token: TokenConfig,
    pub allowed_origins: Vec<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        }),
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                    expected: "\"pretty\" or \"json\"",
                });
            }
        };

        let database = Self::database(&lookup)?;

        let secret = match lookup("SECRET_KEY") {
            Some(secret) => secret,
            None if database.is_some() => return Err(ConfigError::Missing("SECRET_KEY")),
            None => DEV_SECRET.to_string(),
        };
        let algorithm_name = lookup("ALGORITHM").unwrap_or_else(|| "HS256".to_string());
        let algorithm = parse_algorithm(&algorithm_name).map_err(|_| ConfigError::Invalid {
            var: "ALGORITHM",
            value: algorithm_name.clone(),
            expected: "one of HS256, HS384, HS512",
        })?;
        let access_minutes: i64 = parse(
            &lookup,
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            30,
            "a whole number of minutes",
        )?;
        let refresh_days: i64 =
            parse(&lookup, "REFRESH_TOKEN_EXPIRE_DAYS", 7, "a whole number of days")?;

        let mut token = TokenConfig::new(secret);
        token.algorithm = algorithm;
        token.access_ttl = Duration::minutes(access_minutes);
        token.refresh_ttl = Duration::days(refresh_days);

        let mut allowed_origins: Vec<String> = DEV_ORIGINS.iter().map(|o| o.to_string()).collect();
        if let Some(frontend) = lookup("FRONTEND_URL") {
            allowed_origins.insert(0, frontend);
        }
        if let Some(extra) = lookup("ALLOWED_ORIGINS") {
            allowed_origins.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from),
            );
        }
        allowed_origins.dedup();

        let bootstrap_admin = match (
            lookup("BOOTSTRAP_ADMIN_EMAIL"),
            lookup("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                full_name: lookup("BOOTSTRAP_ADMIN_NAME")
                    .unwrap_or_else(|| "Administrator".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&lookup, "PORT", 8000, "a port number")?,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format,
            database,
            token,
            allowed_origins,
            bootstrap_admin,
        })
    }

    fn database(
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<Option<DatabaseConfig>, ConfigError> {
        let max_connections = parse(
            lookup,
            "DATABASE_MAX_CONNECTIONS",
            10,
            "a positive number of connections",
        )?;

        let url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let (Some(user), Some(host), Some(name)) = (
                    lookup("DATABASE_USER"),
                    lookup("DATABASE_HOST"),
                    lookup("DATABASE_NAME"),
                ) else {
                    return Ok(None);
                };
                let port: u16 = parse(lookup, "DATABASE_PORT", 5432, "a port number")?;
                let password = lookup("DATABASE_PASSWORD").unwrap_or_default();
                format!("postgres://{user}:{password}@{host}:{port}/{name}")
            }
        };

        Ok(Some(DatabaseConfig {
            url,
            max_connections,
        }))
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:8000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database.is_none());
        assert_eq!(config.token.access_ttl, Duration::minutes(30));
        assert_eq!(config.token.refresh_ttl, Duration::days(7));
        assert!(config.bootstrap_admin.is_none());
        assert!(
            config
                .allowed_origins
                .contains(&"http://localhost:5173".to_string())
        );
    }

    #[test]
    fn test_database_from_parts() {
        let config = load(&[
            ("DATABASE_USER", "pantry"),
            ("DATABASE_PASSWORD", "pw"),
            ("DATABASE_HOST", "db"),
            ("DATABASE_NAME", "inventory"),
            ("SECRET_KEY", "s3cret"),
        ])
        .unwrap();
        let database = config.database.unwrap();
        assert_eq!(database.url, "postgres://pantry:pw@db:5432/inventory");
        assert_eq!(database.max_connections, 10);
    }

    #[test]
    fn test_database_requires_secret() {
        let err = load(&[("DATABASE_URL", "postgres://localhost/x")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SECRET_KEY")));
    }

    #[test]
    fn test_malformed_numbers_fail() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));

        let err = load(&[("ACCESS_TOKEN_EXPIRE_MINUTES", "soon")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "ACCESS_TOKEN_EXPIRE_MINUTES",
                ..
            }
        ));

        let err = load(&[("ALGORITHM", "RS256")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "ALGORITHM", .. }));
    }

    #[test]
    fn test_origins_and_bootstrap() {
        let config = load(&[
            ("FRONTEND_URL", "https://pantry.example.com"),
            ("ALLOWED_ORIGINS", "https://a.example.com, ,https://b.example.com"),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@example.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "Secret123"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.allowed_origins[0], "https://pantry.example.com");
        assert!(
            config
                .allowed_origins
                .contains(&"https://b.example.com".to_string())
        );
        assert_eq!(config.log_format, LogFormat::Json);

        let admin = config.bootstrap_admin.unwrap();
        assert_eq!(admin.full_name, "Administrator");
        assert!(!format!("{admin:?}").contains("Secret123"));
    }
}
