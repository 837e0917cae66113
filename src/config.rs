//! Environment-driven configuration.
//!
//! DESIGN
//! ======
//! Every tunable is read from the process environment (optionally seeded
//! from `.env` by `dotenvy` in `main`). Typed configs expose `from_env()`
//! and fall back to compiled defaults when a variable is missing or fails
//! to parse, so a bad value never prevents startup.

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
const DEFAULT_LOGIN_TIMEOUT_MS: u64 = 8000;

/// Parse an environment variable, falling back to `default` when it is
/// missing or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Parse a boolean-ish environment variable (`1/true/yes/on`, `0/false/no/off`).
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

/// Process-level settings consumed by `main` and the auth layer.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Mark the session cookie `Secure`.
    pub cookie_secure: bool,
    pub session_ttl_hours: i64,
    /// Upper bound on each database round-trip made by the login flow.
    pub login_timeout_ms: u64,
    /// Seed admin created when the `profiles` table is empty.
    pub bootstrap_admin: Option<(String, String)>,
}

impl ServerConfig {
    /// Load settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_USERNAME").ok(),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
        ) {
            (Some(user), Some(pass)) if !user.trim().is_empty() && !pass.is_empty() => {
                Some((user.trim().to_owned(), pass))
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS),
            login_timeout_ms: env_parse("LOGIN_TIMEOUT_MS", DEFAULT_LOGIN_TIMEOUT_MS),
            bootstrap_admin,
        })
    }

    /// Settings for tests that never reach a real database.
    #[cfg(test)]
    #[must_use]
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            cookie_secure: false,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            login_timeout_ms: DEFAULT_LOGIN_TIMEOUT_MS,
            bootstrap_admin: None,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
