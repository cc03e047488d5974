//! Responses for denied requests.

use http::{header, HeaderValue, Request, Response, StatusCode};
use sealcsrf_core::{vary_cookie, FailureReason};

/// Body of the default denial response.
pub const FORBIDDEN_BODY: &str = "Forbidden - CSRF token invalid";

/// Builds the response for a request that failed CSRF validation.
///
/// The request still carries its [`CsrfContext`](sealcsrf_core::CsrfContext)
/// extension, so handlers can render a page with a fresh token. Any
/// `Fn(Request<ReqBody>, FailureReason) -> Response<ResBody>` closure is an
/// error handler.
///
/// ```ignore
/// let layer = CsrfLayer::new(config)?.error_handler(|_req, reason: FailureReason| {
///     Response::builder()
///         .status(StatusCode::FORBIDDEN)
///         .body(Full::from(format!("denied: {}", reason.code())))
///         .unwrap()
/// });
/// ```
pub trait ErrorHandler<ReqBody, ResBody>: Send + Sync + 'static {
    /// Produce the response for a denied request.
    fn handle(&self, req: Request<ReqBody>, reason: FailureReason) -> Response<ResBody>;
}

impl<F, ReqBody, ResBody> ErrorHandler<ReqBody, ResBody> for F
where
    F: Fn(Request<ReqBody>, FailureReason) -> Response<ResBody> + Send + Sync + 'static,
{
    fn handle(&self, req: Request<ReqBody>, reason: FailureReason) -> Response<ResBody> {
        self(req, reason)
    }
}

/// Plain `403 Forbidden` that does not reveal the failure reason.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl<ReqBody, ResBody> ErrorHandler<ReqBody, ResBody> for DefaultErrorHandler
where
    ResBody: From<&'static str>,
{
    fn handle(&self, _req: Request<ReqBody>, _reason: FailureReason) -> Response<ResBody> {
        plain_response(StatusCode::FORBIDDEN, FORBIDDEN_BODY)
    }
}

pub(crate) fn plain_response<ResBody>(status: StatusCode, body: &'static str) -> Response<ResBody>
where
    ResBody: From<&'static str>,
{
    let mut response = Response::new(ResBody::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// `500` for a request that cannot be served safely, with `Vary: Cookie`
/// like every other response of the layer.
pub(crate) fn internal_error<ResBody>() -> Response<ResBody>
where
    ResBody: From<&'static str>,
{
    let mut response = plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    vary_cookie(&mut response);
    response
}
