use anyhow::{anyhow, Context};
use std::str::FromStr;

use crate::auth::MAX_TOKEN_MAXAGE_MINUTES;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_maxage_minutes: i64,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    /// Distance charged when a descriptor carries no coordinates
    pub default_distance_km: f64,
}

impl Config {
    /// Reads the configuration from environment variables.
    ///
    /// Call `dotenv()` first to pick up a local `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Missing optional keys take their defaults; present but malformed
    /// values are errors.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow!("{} must be set", key))
        };

        let database = DatabaseConfig {
            url: required("DATABASE_URL")?,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            acquire_timeout_seconds: parse_or(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECONDS", 5)?,
        };

        let server = ServerConfig {
            host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "SERVER_PORT", 3000)?,
        };

        let auth = AuthConfig {
            jwt_secret: required("JWT_SECRET")?,
            jwt_maxage_minutes: parse_or(&lookup, "JWT_MAXAGE_MINUTES", 60)?,
        };
        if !(1..=MAX_TOKEN_MAXAGE_MINUTES).contains(&auth.jwt_maxage_minutes) {
            anyhow::bail!(
                "JWT_MAXAGE_MINUTES must be between 1 and {}",
                MAX_TOKEN_MAXAGE_MINUTES
            );
        }

        let default_distance_km: f64 = parse_or(&lookup, "DEFAULT_DISTANCE_KM", 10.0)?;
        if !default_distance_km.is_finite() || default_distance_km < 0.0 {
            anyhow::bail!("DEFAULT_DISTANCE_KM must be a non-negative number");
        }

        Ok(Config {
            database,
            server,
            auth,
            default_distance_km,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. With `to_stderr` the
/// fmt layer writes to stderr, keeping stdout free for command output.
pub fn init_tracing(to_stderr: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    if to_stderr {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/rides"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.jwt_maxage_minutes, 60);
        assert_eq!(config.default_distance_km, 10.0);
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let result = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/rides")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_values_are_not_defaulted() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/rides"),
            ("JWT_SECRET", "secret"),
            ("SERVER_PORT", "eighty"),
        ]));
        assert!(result.is_err());

        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/rides"),
            ("JWT_SECRET", "secret"),
            ("DEFAULT_DISTANCE_KM", "-4"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_token_lifetime_is_bounded() {
        for minutes in ["0", "-5", "525601", "9223372036854775807"] {
            let result = Config::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://localhost/rides"),
                ("JWT_SECRET", "secret"),
                ("JWT_MAXAGE_MINUTES", minutes),
            ]));
            assert!(result.is_err(), "{} minutes accepted", minutes);
        }

        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/rides"),
            ("JWT_SECRET", "secret"),
            ("JWT_MAXAGE_MINUTES", "525600"),
        ]))
        .unwrap();
        assert_eq!(config.auth.jwt_maxage_minutes, MAX_TOKEN_MAXAGE_MINUTES);
    }
}
