//! The per-request CSRF decision.
//!
//! [`Protector::evaluate`] loads (or creates) the secret, decides whether the
//! request may proceed, and prepares everything the response needs: a fresh
//! masked token, and a cookie when the secret is new or due for refresh.

use crate::config::CsrfConfig;
use crate::context::{CsrfContext, SkipCheck, Verdict};
use crate::error::{ConfigError, CsrfError, FailureReason};
use crate::mask;
use crate::origin::OriginValidator;
use crate::request::{CsrfRequest, FormEncoding};
use crate::secret::Secret;
use crate::store::CookieStore;
use crate::tracing_macros::{trace_debug, trace_warn};
use cookie::Cookie;
use http::{header, HeaderName, HeaderValue, Method, Response};
use std::fmt;
use std::sync::Arc;

/// Validated, immutable CSRF settings shared by all requests.
///
/// Cheap to share behind an [`Arc`]; every method takes `&self`.
pub struct Protector {
    store: CookieStore,
    origin: OriginValidator,
    header: HeaderName,
    header_name: Arc<str>,
    field_name: Arc<str>,
    safe_methods: Vec<Method>,
    exclude_paths: Vec<String>,
    max_form_bytes: usize,
}

impl Protector {
    /// Validate `config` and build a protector from it.
    pub fn new(config: CsrfConfig) -> Result<Self, ConfigError> {
        let header = config.validate()?;

        Ok(Self {
            store: CookieStore::new(&config)?,
            origin: OriginValidator::new(&config),
            header,
            header_name: Arc::from(config.header_name.as_str()),
            field_name: Arc::from(config.field_name.as_str()),
            safe_methods: config.safe_methods.clone(),
            exclude_paths: config.exclude_paths.clone(),
            max_form_bytes: config.max_form_bytes,
        })
    }

    /// The cookie store.
    pub fn store(&self) -> &CookieStore {
        &self.store
    }

    /// The Referer validator.
    pub fn origin_validator(&self) -> &OriginValidator {
        &self.origin
    }

    /// Form field the token is read from.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Header the token is read from.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Largest form body that will be buffered to look for the token.
    pub fn max_form_bytes(&self) -> usize {
        self.max_form_bytes
    }

    /// Whether `method` skips validation.
    pub fn is_safe(&self, method: &Method) -> bool {
        self.safe_methods.contains(method)
    }

    /// Whether the request is exempt from validation, either through an
    /// excluded path prefix or a [`SkipCheck`] marker.
    pub fn is_exempt(&self, req: &dyn CsrfRequest) -> bool {
        if req.extensions().get::<SkipCheck>().is_some() {
            return true;
        }

        let path = req.uri().path();
        self.exclude_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// The token from the configured header, if present and non-empty.
    pub fn header_token<'r>(&self, req: &'r dyn CsrfRequest) -> Option<&'r str> {
        req.headers()
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .filter(|token| !token.is_empty())
    }

    /// The form encoding to read the token from, when only the body can
    /// carry it.
    ///
    /// `Some` for unsafe, non-exempt requests without a header token whose
    /// body is urlencoded or `multipart/form-data`.
    pub fn form_encoding(&self, req: &dyn CsrfRequest) -> Option<FormEncoding> {
        if self.is_safe(req.method()) || self.is_exempt(req) || self.header_token(req).is_some() {
            return None;
        }

        req.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(FormEncoding::from_content_type)
    }

    /// Run the full decision for one request.
    ///
    /// Denials are reported in the returned [`Evaluation`], never as an
    /// error. `Err` means the request cannot be served safely at all.
    pub fn evaluate<R: CsrfRequest>(&self, req: &R) -> Result<Evaluation, CsrfError> {
        let req: &dyn CsrfRequest = req;

        let (secret, issue, cookie_failure) = match self.load_secret(req) {
            Ok((secret, refresh)) => (secret, refresh, None),
            Err(reason) => (Secret::generate()?, true, Some(reason)),
        };

        let verdict = self.decide(req, &secret, cookie_failure);
        if let Verdict::Denied(reason) = verdict {
            trace_warn!(
                reason = reason.code(),
                method = %req.method(),
                path = %req.uri().path(),
                "CSRF validation failed"
            );
        }

        let token = mask::mask(secret.as_bytes())?;
        let cookie = if issue {
            trace_debug!(
                cookie = %self.store.name(),
                renewed = cookie_failure.is_none(),
                "Issuing CSRF cookie"
            );
            Some(self.store.issue(&secret)?)
        } else {
            None
        };

        let context = CsrfContext::new(
            token,
            self.field_name.clone(),
            self.header_name.clone(),
            verdict.failure_reason(),
        );

        Ok(Evaluation {
            verdict,
            context,
            cookie,
        })
    }

    /// The secret carried by the first valid cookie, and whether it is due
    /// for refresh.
    fn load_secret(&self, req: &dyn CsrfRequest) -> Result<(Secret, bool), FailureReason> {
        let candidates = self.store.read(req.headers());
        if candidates.is_empty() {
            return Err(FailureReason::NoCookie);
        }

        for value in &candidates {
            match self.store.unseal(value) {
                Ok(unsealed) => {
                    let refresh = self.store.needs_refresh(&unsealed);
                    return Ok((unsealed.secret, refresh));
                }
                Err(e) => {
                    trace_debug!(error = %e, cookie = %self.store.name(), "Rejected CSRF cookie");
                }
            }
        }

        Err(FailureReason::BadCookie)
    }

    fn decide(
        &self,
        req: &dyn CsrfRequest,
        secret: &Secret,
        cookie_failure: Option<FailureReason>,
    ) -> Verdict {
        if self.is_exempt(req) || self.is_safe(req.method()) {
            return Verdict::Allowed;
        }

        if let Some(reason) = cookie_failure {
            return Verdict::Denied(reason);
        }

        if let Err(reason) = self.origin.check(req) {
            return Verdict::Denied(reason);
        }

        let token = self
            .header_token(req)
            .or_else(|| req.form_value(&self.field_name).filter(|t| !t.is_empty()));
        let Some(token) = token else {
            return Verdict::Denied(FailureReason::NoToken);
        };

        if mask::unmask(token, secret.as_bytes()) {
            Verdict::Allowed
        } else {
            Verdict::Denied(FailureReason::BadToken)
        }
    }
}

impl fmt::Debug for Protector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protector")
            .field("cookie", &self.store.name())
            .field("header_name", &self.header_name)
            .field("field_name", &self.field_name)
            .field("safe_methods", &self.safe_methods)
            .field("exclude_paths", &self.exclude_paths)
            .field("max_form_bytes", &self.max_form_bytes)
            .finish()
    }
}

/// Result of [`Protector::evaluate`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    verdict: Verdict,
    context: CsrfContext,
    cookie: Option<Cookie<'static>>,
}

impl Evaluation {
    /// Whether the request may proceed.
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// The request-scoped context to expose to handlers.
    pub fn context(&self) -> &CsrfContext {
        &self.context
    }

    /// The cookie to set on the response, if the secret is new or refreshed.
    pub fn cookie(&self) -> Option<&Cookie<'static>> {
        self.cookie.as_ref()
    }

    /// Add `Vary: Cookie` and, when needed, the secret cookie to `response`.
    pub fn decorate<B>(&self, response: &mut Response<B>) {
        vary_cookie(response);

        if let Some(cookie) = &self.cookie {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(_) => {
                    trace_warn!(cookie = %cookie.name(), "CSRF cookie is not a valid header value");
                }
            }
        }
    }
}

/// Append `Vary: Cookie` unless `response` already varies on cookies.
///
/// Every response of a protected service carries it, errors included.
pub fn vary_cookie<B>(response: &mut Response<B>) {
    let headers = response.headers_mut();

    let varies = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|field| field.trim().eq_ignore_ascii_case("cookie"));
    if !varies {
        headers.append(header::VARY, HeaderValue::from_static("Cookie"));
    }
}
