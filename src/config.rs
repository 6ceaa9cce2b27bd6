//! Environment-variable configuration, read once at startup.
//!
//! Grounded on `original_source/settings.py`, which reads the same variables
//! from `os.environ` at import time. We turn a missing required variable
//! into a typed `EngineError::Fatal` instead of an import-time crash.

use std::env;

use url::Url;

use crate::errors::{EngineError, Result};

/// Everything the core needs from the environment (§6).
#[derive(Debug, Clone)]
pub struct Config {
    pub mongodb_url: String,
    pub redis_url: Url,
    pub google_api_key: String,
    pub sentry_url: Option<Url>,
    pub environment: String,
    pub admin_db_url: Option<Url>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Config> {
        Ok(Config {
            mongodb_url: require_env("MONGODB_URL")?,
            redis_url: require_url_env("REDIS_URL")?,
            google_api_key: require_env("GOOGLE_API_KEY")?,
            sentry_url: optional_url_env("SENTRY_URL")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_owned()),
            admin_db_url: optional_url_env("ADMIN_DB_URL")?,
        })
    }

    /// Is the adapter with this provider code enabled? Controlled by
    /// `DISABLE_PROVIDER_<NAME>` (boolean), checked at scheduler
    /// registration time, per §4.6.
    pub fn provider_enabled(&self, provider_code: &str) -> bool {
        let var_name = format!("DISABLE_PROVIDER_{}", provider_code.to_uppercase());
        match env::var(&var_name) {
            Ok(value) => !parse_bool(&value),
            Err(_) => true,
        }
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| EngineError::Fatal(format!("missing required env var {name}")))
}

fn require_url_env(name: &str) -> Result<Url> {
    let raw = require_env(name)?;
    Url::parse(&raw).map_err(|e| {
        EngineError::Fatal(format!("invalid URL in env var {name}: {e}"))
    })
}

fn optional_url_env(name: &str) -> Result<Option<Url>> {
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => Url::parse(&raw)
            .map(Some)
            .map_err(|e| EngineError::Fatal(format!("invalid URL in env var {name}: {e}"))),
        _ => Ok(None),
    }
}

/// Parse a boolean environment variable the way the original scheduler does
/// (`pydantic.parse_obj_as(bool, ...)`): accepts the usual truthy spellings.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for truthy in ["1", "true", "True", "YES", "on"] {
            assert!(parse_bool(truthy), "{truthy:?} should be truthy");
        }
        for falsy in ["0", "false", "no", "off", "", "garbage"] {
            assert!(!parse_bool(falsy), "{falsy:?} should be falsy");
        }
    }
}
