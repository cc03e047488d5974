//! Error types for sealcsrf

use crate::mask::MaskError;
use crate::random::RandomError;
use crate::store::SealError;

/// Result type alias for pipeline operations
pub type Result<T, E = CsrfError> = std::result::Result<T, E>;

/// Why a request was denied.
///
/// The set is closed: every denial produced by the pipeline carries exactly
/// one of these. Denials are terminal, the client recovers by fetching a
/// fresh token with a safe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum FailureReason {
    /// The secret cookie is missing on an unsafe request.
    #[error("CSRF cookie not present in request")]
    NoCookie,

    /// The secret cookie failed authentication, was malformed or expired.
    #[error("CSRF cookie could not be authenticated")]
    BadCookie,

    /// The Referer header is missing.
    #[error("referer not supplied")]
    NoReferer,

    /// The Referer does not belong to a trusted origin.
    #[error("referer invalid")]
    BadReferer,

    /// No token in the configured header or form field.
    #[error("CSRF token not found in request")]
    NoToken,

    /// The token does not unmask to the cookie secret.
    #[error("CSRF token invalid")]
    BadToken,
}

impl FailureReason {
    /// Stable machine-readable code, suitable for logs and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoCookie => "no_cookie",
            Self::BadCookie => "bad_cookie",
            Self::NoReferer => "no_referer",
            Self::BadReferer => "bad_referer",
            Self::NoToken => "no_token",
            Self::BadToken => "bad_token",
        }
    }
}

/// Configuration errors, raised once when a [`Protector`](crate::Protector) is built.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The master key is not exactly [`KEY_LEN`](crate::KEY_LEN) bytes.
    #[error("signing key must be exactly {expected} bytes, got {actual}")]
    KeyLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// The cookie name is empty.
    #[error("cookie name must not be empty")]
    EmptyCookieName,

    /// The token header name is empty or not a valid header name.
    #[error("invalid token header name: {0:?}")]
    InvalidHeaderName(String),

    /// The token form field name is empty.
    #[error("form field name must not be empty")]
    EmptyFieldName,

    /// A trusted origin entry is empty.
    #[error("trusted origin entries must not be empty")]
    EmptyTrustedOrigin,

    /// An excluded path prefix is empty, which would exempt every request.
    #[error("excluded path prefixes must not be empty")]
    EmptyExcludedPath,

    /// `SameSite=None` cookies are rejected by browsers unless `Secure` is set.
    #[error("SameSite=None requires the Secure cookie attribute")]
    SameSiteNoneRequiresSecure,

    /// The safe-method set contains a method that changes server state.
    #[error("method {0} cannot be treated as safe")]
    UnsafeSafeMethod(String),

    /// Environment variables could not be deserialized.
    #[cfg(feature = "config")]
    #[error("configuration error: {0}")]
    Env(#[from] envy::Error),

    /// The key in the environment is not valid base64.
    #[cfg(feature = "config")]
    #[error("signing key is not valid base64: {0}")]
    KeyEncoding(#[from] base64::DecodeError),

    /// A setting in the environment has an unknown value.
    #[cfg(feature = "config")]
    #[error("unknown value {value:?} for {setting}")]
    InvalidValue {
        /// Setting name
        setting: &'static str,
        /// Rejected value
        value: String,
    },
}

/// Failures that are not request denials.
///
/// These indicate the server cannot safely continue with the request at all.
#[derive(Debug, thiserror::Error)]
pub enum CsrfError {
    /// The operating system entropy source failed.
    #[error(transparent)]
    Entropy(#[from] RandomError),

    /// The secret could not be sealed into a cookie.
    #[error(transparent)]
    Seal(#[from] SealError),

    /// The token could not be masked.
    #[error(transparent)]
    Mask(#[from] MaskError),
}
