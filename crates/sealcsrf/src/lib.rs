//! # sealcsrf
//!
//! Cross-site request forgery protection using the double-submit cookie
//! pattern.
//!
//! Each client holds a random secret in a signed or encrypted cookie. Every
//! response exposes a fresh one-time-pad masking of that secret, which the
//! client sends back in a header or form field on state-changing requests.
//! Unsafe requests must also carry a Referer from the same origin or a
//! trusted one.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sealcsrf::prelude::*;
//!
//! let layer = CsrfLayer::new(
//!     CsrfConfig::new(key)                   // 32 bytes, keep it stable across restarts
//!         .trusted_origins(["app.example.com"])
//!         .exclude_paths(["/webhooks/"]),
//! )?;
//!
//! let app = tower::ServiceBuilder::new().layer(layer).service(router);
//!
//! // In a handler:
//! let token = sealcsrf::token(&req);         // embed in the page or JSON
//! ```
//!
//! ## Optional Features
//!
//! - `tower` (default) - [`CsrfLayer`] middleware
//! - `tracing` (default) - log denials and cookie issuance
//! - `view` - hidden form fields for Tera templates
//! - `config` - [`CsrfSettings`] from `CSRF_*` environment variables
//! - `full` - all of the above

pub use sealcsrf_core::*;

#[cfg(feature = "tower")]
pub use sealcsrf_tower::{
    failure_reason, token, CsrfLayer, CsrfService, DefaultErrorHandler, ErrorHandler,
    FORBIDDEN_BODY,
};

#[cfg(feature = "view")]
pub use sealcsrf_view as view;

/// Commonly used items.
pub mod prelude {
    pub use sealcsrf_core::{
        skip_check, CookieProtection, CsrfConfig, CsrfContext, FailureReason, Protector,
        SameSite, Verdict,
    };

    #[cfg(feature = "config")]
    pub use sealcsrf_core::CsrfSettings;

    #[cfg(feature = "tower")]
    pub use sealcsrf_tower::{failure_reason, token, CsrfLayer, ErrorHandler};

    #[cfg(feature = "view")]
    pub use sealcsrf_view::{csrf_field, insert_csrf, template_field};
}
