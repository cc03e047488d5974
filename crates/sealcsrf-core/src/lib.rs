//! # sealcsrf core
//!
//! Framework-agnostic building blocks of the sealcsrf double-submit cookie
//! filter:
//!
//! - [`mask`]: one-time-pad masking of the per-client secret
//! - [`CookieStore`]: the secret sealed (signed or encrypted) in a cookie
//! - [`OriginValidator`]: Referer checks for unsafe requests
//! - [`Protector`]: the full per-request decision
//!
//! This crate is not meant to be used directly. Use `sealcsrf` instead.

mod config;
mod context;
mod error;
pub mod mask;
mod origin;
mod pipeline;
pub mod random;
mod request;
mod secret;
#[cfg(feature = "config")]
mod settings;
mod store;
mod tracing_macros;

// Public API
pub use config::{
    CookieProtection, CsrfConfig, TrustedOriginsCallback, DEFAULT_COOKIE_NAME,
    DEFAULT_FIELD_NAME, DEFAULT_HEADER_NAME, DEFAULT_MAX_AGE, DEFAULT_MAX_FORM_BYTES, KEY_LEN,
};
pub use context::{skip_check, CsrfContext, SkipCheck, Verdict};
pub use error::{ConfigError, CsrfError, FailureReason, Result};
pub use mask::MaskError;
pub use origin::OriginValidator;
pub use pipeline::{vary_cookie, Evaluation, Protector};
pub use random::RandomError;
pub use request::{CsrfRequest, FormEncoding, FormRequest};
pub use secret::{Secret, SECRET_LEN};
#[cfg(feature = "config")]
pub use settings::{CsrfSettings, ENV_PREFIX};
pub use store::{CookieStore, SealError, UnsealError, Unsealed};

// Re-exported so callers can name cookie attributes and write trust
// callbacks without direct dependencies.
pub use cookie::{Cookie, SameSite};
pub use url::Url;
