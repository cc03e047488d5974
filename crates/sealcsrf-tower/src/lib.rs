//! # sealcsrf tower
//!
//! [`CsrfLayer`] wraps any `tower` service over `http` requests with
//! double-submit cookie CSRF protection.
//!
//! Handlers read the token to embed in pages or API responses with
//! [`token`]; error handlers read the reason with [`failure_reason`].
//!
//! Tokens are accepted from the configured header, or from the configured
//! field of an `application/x-www-form-urlencoded` body. Such bodies are
//! buffered up to the configured limit and handed on unchanged. Multipart
//! bodies are not inspected; send the token in the header instead.

mod body;
mod handler;
mod layer;

pub use handler::{DefaultErrorHandler, ErrorHandler, FORBIDDEN_BODY};
pub use layer::{CsrfLayer, CsrfService};

use http::Request;
use sealcsrf_core::{CsrfContext, FailureReason};

/// The masked token for the current request.
///
/// `None` outside of a [`CsrfLayer`].
pub fn token<B>(req: &Request<B>) -> Option<&str> {
    CsrfContext::from_extensions(req.extensions()).map(CsrfContext::token)
}

/// Why the current request was denied.
///
/// Only meaningful inside an [`ErrorHandler`]; allowed requests yield `None`.
pub fn failure_reason<B>(req: &Request<B>) -> Option<FailureReason> {
    CsrfContext::from_extensions(req.extensions()).and_then(CsrfContext::failure_reason)
}
