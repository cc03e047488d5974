use crate::error::ConfigError;
use crate::request::CsrfRequest;
use crate::tracing_macros::trace_warn;
use cookie::SameSite;
use http::{HeaderName, Method};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

/// Required length of the master signing key, in bytes.
pub const KEY_LEN: usize = 32;

/// Default name of the secret cookie.
pub const DEFAULT_COOKIE_NAME: &str = "_csrf";

/// Default header carrying the masked token.
pub const DEFAULT_HEADER_NAME: &str = "X-CSRF-Token";

/// Default form field carrying the masked token.
pub const DEFAULT_FIELD_NAME: &str = "csrf_token";

/// Default cookie lifetime: 12 hours.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// Default limit for buffered form bodies: 64 KiB.
pub const DEFAULT_MAX_FORM_BYTES: usize = 64 * 1024;

/// Decides whether a cross-origin Referer is trusted.
///
/// Receives the parsed Referer and the request, and has full discretion.
pub type TrustedOriginsCallback = Arc<dyn Fn(&Url, &dyn CsrfRequest) -> bool + Send + Sync>;

/// How the secret is protected inside the cookie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CookieProtection {
    /// Authenticated only (HMAC-SHA256). The secret is readable by the client.
    Signed,
    /// Authenticated and encrypted (AES-256-GCM).
    #[default]
    Encrypted,
}

/// Configuration for CSRF protection.
///
/// Built once, validated by [`Protector::new`](crate::Protector::new) and
/// immutable afterwards.
#[derive(Clone)]
pub struct CsrfConfig {
    pub(crate) key: Zeroizing<Vec<u8>>,

    /// The name of the cookie holding the sealed secret.
    /// Default: "_csrf"
    pub cookie_name: String,

    /// The domain for the cookie.
    /// Default: None
    pub cookie_domain: Option<String>,

    /// The path for the cookie.
    /// Default: "/"
    pub cookie_path: String,

    /// The lifetime of the cookie. Zero means a session cookie whose seal
    /// never expires on the server side.
    /// Default: 12 hours
    pub cookie_max_age: Duration,

    /// Whether the cookie is only sent over HTTPS. Also decides the scheme
    /// assumed for requests whose URI carries none.
    /// Default: true
    pub cookie_secure: bool,

    /// Whether the cookie is hidden from scripts. The token travels
    /// separately, so the cookie never needs to be readable.
    /// Default: true
    pub cookie_http_only: bool,

    /// The SameSite attribute for the cookie.
    /// Default: Lax
    pub cookie_same_site: SameSite,

    /// The header checked first for the masked token.
    /// Default: "X-CSRF-Token"
    pub header_name: String,

    /// The form field checked when the header is absent.
    /// Default: "csrf_token"
    pub field_name: String,

    /// Methods that skip Referer and token validation.
    /// Default: GET, HEAD, OPTIONS, TRACE
    pub safe_methods: Vec<Method>,

    /// Hosts (no scheme) trusted as cross-origin Referers. Entries carrying a
    /// scheme never match.
    pub trusted_origins: Vec<String>,

    /// Callback deciding cross-origin trust. Takes precedence over
    /// `trusted_origins`.
    pub trusted_origins_callback: Option<TrustedOriginsCallback>,

    /// Path prefixes exempt from validation.
    pub exclude_paths: Vec<String>,

    /// Signed or encrypted cookie.
    /// Default: Encrypted
    pub protection: CookieProtection,

    /// Largest form body buffered to look for the form token.
    /// Default: 64 KiB
    pub max_form_bytes: usize,
}

impl CsrfConfig {
    /// Create a default configuration around a master key.
    ///
    /// The key must be [`KEY_LEN`] bytes; this is checked when the
    /// configuration is turned into a [`Protector`](crate::Protector).
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Zeroizing::new(key.into()),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_domain: None,
            cookie_path: "/".to_string(),
            cookie_max_age: DEFAULT_MAX_AGE,
            cookie_secure: true,
            cookie_http_only: true,
            cookie_same_site: SameSite::Lax,
            header_name: DEFAULT_HEADER_NAME.to_string(),
            field_name: DEFAULT_FIELD_NAME.to_string(),
            safe_methods: vec![Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE],
            trusted_origins: Vec::new(),
            trusted_origins_callback: None,
            exclude_paths: Vec::new(),
            protection: CookieProtection::default(),
            max_form_bytes: DEFAULT_MAX_FORM_BYTES,
        }
    }

    /// Set the cookie name.
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the cookie domain.
    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set the cookie path.
    pub fn cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Set the cookie lifetime.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.cookie_max_age = max_age;
        self
    }

    /// Set the secure flag.
    pub fn secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Set the HttpOnly flag.
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    /// Set the SameSite attribute.
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    /// Set the token header name.
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Set the token form field name.
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Replace the safe-method set.
    pub fn safe_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.safe_methods = methods.into_iter().collect();
        self
    }

    /// Set the trusted Referer hosts, e.g. `"api.example.com"`.
    pub fn trusted_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Decide cross-origin trust with a callback.
    pub fn trusted_origins_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Url, &dyn CsrfRequest) -> bool + Send + Sync + 'static,
    {
        self.trusted_origins_callback = Some(Arc::new(callback));
        self
    }

    /// Exempt path prefixes from validation.
    pub fn exclude_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Choose between a signed and an encrypted cookie.
    pub fn protection(mut self, protection: CookieProtection) -> Self {
        self.protection = protection;
        self
    }

    /// Set the largest form body buffered for token lookup.
    pub fn max_form_bytes(mut self, limit: usize) -> Self {
        self.max_form_bytes = limit;
        self
    }

    /// Reject conflicting settings. Yields the parsed token header.
    pub(crate) fn validate(&self) -> Result<HeaderName, ConfigError> {
        if self.key.len() != KEY_LEN {
            return Err(ConfigError::KeyLength {
                expected: KEY_LEN,
                actual: self.key.len(),
            });
        }

        if self.cookie_name.is_empty() {
            return Err(ConfigError::EmptyCookieName);
        }

        let header = HeaderName::from_bytes(self.header_name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(self.header_name.clone()))?;

        if self.field_name.is_empty() {
            return Err(ConfigError::EmptyFieldName);
        }

        if self.cookie_same_site == SameSite::None && !self.cookie_secure {
            return Err(ConfigError::SameSiteNoneRequiresSecure);
        }

        if let Some(method) = self.safe_methods.iter().find(|m| {
            matches!(
                **m,
                Method::POST | Method::PUT | Method::PATCH | Method::DELETE
            )
        }) {
            return Err(ConfigError::UnsafeSafeMethod(method.to_string()));
        }

        if self.exclude_paths.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyExcludedPath);
        }

        if self.trusted_origins.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyTrustedOrigin);
        }

        for origin in self.trusted_origins.iter().filter(|o| o.contains("://")) {
            trace_warn!(
                origin = %origin,
                "Trusted origin contains a scheme and will never match; list bare hosts only"
            );
        }

        if self.trusted_origins_callback.is_some() && !self.trusted_origins.is_empty() {
            trace_warn!("Both trusted origins and a trust callback are configured; the callback wins");
        }

        Ok(header)
    }
}

impl fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("key", &"***")
            .field("cookie_name", &self.cookie_name)
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_max_age", &self.cookie_max_age)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_http_only", &self.cookie_http_only)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("header_name", &self.header_name)
            .field("field_name", &self.field_name)
            .field("safe_methods", &self.safe_methods)
            .field("trusted_origins", &self.trusted_origins)
            .field(
                "trusted_origins_callback",
                &self.trusted_origins_callback.as_ref().map(|_| "<callback>"),
            )
            .field("exclude_paths", &self.exclude_paths)
            .field("protection", &self.protection)
            .field("max_form_bytes", &self.max_form_bytes)
            .finish()
    }
}
