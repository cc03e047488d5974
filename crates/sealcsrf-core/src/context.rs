//! Request-scoped CSRF state.

use crate::error::FailureReason;
use http::Extensions;
use std::fmt;
use std::sync::Arc;

/// Outcome of validating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Pass the request on to the handler.
    Allowed,
    /// Short-circuit to the error handler.
    Denied(FailureReason),
}

impl Verdict {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// The denial reason, if any.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(*reason),
        }
    }
}

/// Per-request CSRF state, stored in the request extensions.
///
/// Carries the fresh masked token for templates and API responses, and the
/// failure reason for error handlers.
#[derive(Clone)]
pub struct CsrfContext {
    token: String,
    field_name: Arc<str>,
    header_name: Arc<str>,
    failure: Option<FailureReason>,
}

impl CsrfContext {
    /// Assemble a context. Normally built by the pipeline.
    pub fn new(
        token: String,
        field_name: Arc<str>,
        header_name: Arc<str>,
        failure: Option<FailureReason>,
    ) -> Self {
        Self {
            token,
            field_name,
            header_name,
            failure,
        }
    }

    /// The masked token to embed in the response.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Form field the token is expected in.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Header the token is expected in.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Why the request was denied, if it was.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure
    }

    /// Read the context from request extensions.
    pub fn from_extensions(extensions: &Extensions) -> Option<&Self> {
        extensions.get::<Self>()
    }
}

impl fmt::Debug for CsrfContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfContext")
            .field("token", &"***")
            .field("field_name", &self.field_name)
            .field("header_name", &self.header_name)
            .field("failure", &self.failure)
            .finish()
    }
}

/// Marker extension that exempts a single request from validation.
///
/// Insert it from an earlier middleware, e.g. for requests authenticated
/// by a bearer token rather than cookies. A fresh token is still issued.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipCheck;

/// Exempt the request owning `extensions` from CSRF validation.
pub fn skip_check(extensions: &mut Extensions) {
    extensions.insert(SkipCheck);
}
