//! Fetch engine configuration.
//!
//! WHY: Centralizes the engine's fixed limits in one place so they can be shared
//! across fetchers or overridden from a config file.
//!
//! WHAT: Redirect bound, per-address idle connection cap and the User-Agent
//! token. Defaults are 10 redirects, 6 idle connections and `EweFetch/1.0`.
//!
//! HOW: Plain struct with `Default`, deserializable from TOML where every field
//! is optional.

use crate::errors::ConfigError;
use crate::pool::MAX_IDLE_PER_HOST;
use serde::Deserialize;

pub const MAX_REDIRECTS: usize = 10;
pub const USER_AGENT: &str = "EweFetch/1.0";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of hops followed for one fetch.
    pub max_redirects: usize,
    /// Maximum idle keep-alive connections kept per `host:port`.
    pub max_idle_per_host: usize,
    /// Value of the `User-Agent` request header.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: MAX_REDIRECTS,
            max_idle_per_host: MAX_IDLE_PER_HOST,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    /// Parses a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed TOML and
    /// [`ConfigError::Invalid`] for values the engine cannot honour.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the User-Agent can be sent as a single header line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the token is empty or contains a
    /// line break.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".into()));
        }
        if self.user_agent.contains(['\r', '\n']) {
            return Err(ConfigError::Invalid(
                "user_agent must not contain line breaks".into(),
            ));
        }
        Ok(())
    }
}
