//! Configuration from environment variables.
//!
//! Every setting is read from a `CSRF_`-prefixed variable, so
//! `CSRF_COOKIE_NAME` sets [`CsrfSettings::cookie_name`]. List settings are
//! comma separated. The master key is given in standard base64 in `CSRF_KEY`.
//!
//! ```ignore
//! use sealcsrf_core::{CsrfSettings, Protector};
//!
//! // CSRF_KEY=<base64 of 32 random bytes>
//! // CSRF_TRUSTED_ORIGINS=app.example.com,admin.example.com
//! let config = CsrfSettings::from_env()?.into_config()?;
//! let protector = Protector::new(config)?;
//! ```

use crate::config::{CookieProtection, CsrfConfig};
use crate::error::ConfigError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cookie::SameSite;
use serde::Deserialize;
use std::time::Duration;
use zeroize::Zeroizing;

/// Prefix of every recognized environment variable.
pub const ENV_PREFIX: &str = "CSRF_";

/// Raw settings as read from the environment.
///
/// Unset values keep the [`CsrfConfig`] defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct CsrfSettings {
    /// Base64 master key (`CSRF_KEY`)
    pub key: String,
    /// `CSRF_COOKIE_NAME`
    pub cookie_name: Option<String>,
    /// `CSRF_COOKIE_DOMAIN`
    pub cookie_domain: Option<String>,
    /// `CSRF_COOKIE_PATH`
    pub cookie_path: Option<String>,
    /// Cookie lifetime in seconds, 0 for a session cookie (`CSRF_MAX_AGE_SECS`)
    pub max_age_secs: Option<u64>,
    /// `CSRF_SECURE`
    pub secure: Option<bool>,
    /// `CSRF_HTTP_ONLY`
    pub http_only: Option<bool>,
    /// `strict`, `lax` or `none` (`CSRF_SAME_SITE`)
    pub same_site: Option<String>,
    /// `CSRF_HEADER_NAME`
    pub header_name: Option<String>,
    /// `CSRF_FIELD_NAME`
    pub field_name: Option<String>,
    /// `CSRF_TRUSTED_ORIGINS`
    #[serde(default)]
    pub trusted_origins: Vec<String>,
    /// `CSRF_EXCLUDE_PATHS`
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    /// `signed` or `encrypted` (`CSRF_PROTECTION`)
    pub protection: Option<String>,
    /// `CSRF_MAX_FORM_BYTES`
    pub max_form_bytes: Option<usize>,
}

impl CsrfSettings {
    /// Load settings from the process environment, after loading `.env` if
    /// one exists. Variables already set take precedence over `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }

    /// Convert into a [`CsrfConfig`].
    ///
    /// Decodes the key and parses enumerated values. Full validation still
    /// happens when the config is turned into a [`Protector`](crate::Protector).
    pub fn into_config(self) -> Result<CsrfConfig, ConfigError> {
        let key = Zeroizing::new(STANDARD.decode(self.key.trim())?);
        let mut config = CsrfConfig::new(key.to_vec());

        if let Some(name) = self.cookie_name {
            config = config.cookie_name(name);
        }
        if let Some(domain) = self.cookie_domain {
            config = config.cookie_domain(domain);
        }
        if let Some(path) = self.cookie_path {
            config = config.cookie_path(path);
        }
        if let Some(secs) = self.max_age_secs {
            config = config.max_age(Duration::from_secs(secs));
        }
        if let Some(secure) = self.secure {
            config = config.secure(secure);
        }
        if let Some(http_only) = self.http_only {
            config = config.http_only(http_only);
        }
        if let Some(same_site) = self.same_site {
            config = config.same_site(parse_same_site(&same_site)?);
        }
        if let Some(name) = self.header_name {
            config = config.header_name(name);
        }
        if let Some(name) = self.field_name {
            config = config.field_name(name);
        }
        if let Some(protection) = self.protection {
            config = config.protection(parse_protection(&protection)?);
        }
        if let Some(limit) = self.max_form_bytes {
            config = config.max_form_bytes(limit);
        }

        Ok(config
            .trusted_origins(self.trusted_origins)
            .exclude_paths(self.exclude_paths))
    }
}

fn parse_same_site(value: &str) -> Result<SameSite, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "strict" => Ok(SameSite::Strict),
        "lax" => Ok(SameSite::Lax),
        "none" => Ok(SameSite::None),
        _ => Err(ConfigError::InvalidValue {
            setting: "same_site",
            value: value.to_string(),
        }),
    }
}

fn parse_protection(value: &str) -> Result<CookieProtection, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "signed" => Ok(CookieProtection::Signed),
        "encrypted" => Ok(CookieProtection::Encrypted),
        _ => Err(ConfigError::InvalidValue {
            setting: "protection",
            value: value.to_string(),
        }),
    }
}
