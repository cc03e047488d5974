//! The CSRF layer and service.

use crate::body::{read_form, BoxError, FormBody};
use crate::handler::{internal_error, DefaultErrorHandler, ErrorHandler};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{Request, Response};
use http_body::Body;
use sealcsrf_core::{ConfigError, CsrfConfig, FormRequest, Protector, Verdict};
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Layer;
use tower_service::Service;

/// Applies double-submit cookie CSRF protection to the wrapped service.
///
/// Every request gets a [`CsrfContext`](sealcsrf_core::CsrfContext)
/// extension with a fresh masked token, and every response gets
/// `Vary: Cookie`. Unsafe requests that fail validation are answered by the
/// error handler instead of the inner service.
///
/// # Example
///
/// ```rust,ignore
/// use sealcsrf_tower::CsrfLayer;
/// use sealcsrf_core::CsrfConfig;
///
/// let layer = CsrfLayer::new(CsrfConfig::new(key).trusted_origins(["app.example.com"]))?;
/// let service = tower::ServiceBuilder::new().layer(layer).service(app);
/// ```
pub struct CsrfLayer<H = DefaultErrorHandler> {
    protector: Arc<Protector>,
    handler: Arc<H>,
}

impl CsrfLayer {
    /// Validate `config` and build a layer with the default error handler.
    pub fn new(config: CsrfConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_protector(Arc::new(Protector::new(config)?)))
    }

    /// Build a layer around an existing protector.
    pub fn from_protector(protector: Arc<Protector>) -> Self {
        Self {
            protector,
            handler: Arc::new(DefaultErrorHandler),
        }
    }
}

impl<H> CsrfLayer<H> {
    /// Replace the handler that answers denied requests.
    pub fn error_handler<H2>(self, handler: H2) -> CsrfLayer<H2> {
        CsrfLayer {
            protector: self.protector,
            handler: Arc::new(handler),
        }
    }

    /// The shared protector.
    pub fn protector(&self) -> &Arc<Protector> {
        &self.protector
    }
}

impl<H> Clone for CsrfLayer<H> {
    fn clone(&self) -> Self {
        Self {
            protector: self.protector.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<H> fmt::Debug for CsrfLayer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfLayer")
            .field("protector", &self.protector)
            .finish_non_exhaustive()
    }
}

impl<S, H> Layer<S> for CsrfLayer<H> {
    type Service = CsrfService<S, H>;

    fn layer(&self, inner: S) -> Self::Service {
        CsrfService {
            inner,
            protector: self.protector.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// Service produced by [`CsrfLayer`].
pub struct CsrfService<S, H = DefaultErrorHandler> {
    inner: S,
    protector: Arc<Protector>,
    handler: Arc<H>,
}

impl<S: Clone, H> Clone for CsrfService<S, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            protector: self.protector.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<S: fmt::Debug, H> fmt::Debug for CsrfService<S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfService")
            .field("inner", &self.inner)
            .field("protector", &self.protector)
            .finish_non_exhaustive()
    }
}

impl<S, H, ReqBody, ResBody> Service<Request<ReqBody>> for CsrfService<S, H>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    H: ErrorHandler<ReqBody, ResBody>,
    ReqBody: Body + From<Bytes> + Send + 'static,
    ReqBody::Data: Send,
    ReqBody::Error: Into<BoxError>,
    ResBody: From<&'static str> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // The clone may not be ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let protector = self.protector.clone();
        let handler = self.handler.clone();

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();

            let (evaluation, body) = match protector.form_encoding(&parts) {
                Some(encoding) => {
                    let limit = protector.max_form_bytes();
                    match read_form(body, limit, &encoding, protector.field_name()).await {
                        FormBody::Parsed { bytes, pairs } => (
                            protector.evaluate(&FormRequest::new(&parts, &pairs)),
                            ReqBody::from(bytes),
                        ),
                        FormBody::Unreadable(error) => {
                            tracing::debug!(error = %error, "CSRF form body not readable");
                            (protector.evaluate(&parts), ReqBody::from(Bytes::new()))
                        }
                    }
                }
                None => (protector.evaluate(&parts), body),
            };

            let evaluation = match evaluation {
                Ok(evaluation) => evaluation,
                Err(error) => {
                    tracing::error!(error = %error, "CSRF protection failed");
                    return Ok(internal_error());
                }
            };

            parts.extensions.insert(evaluation.context().clone());
            let req = Request::from_parts(parts, body);

            let mut response = match evaluation.verdict() {
                Verdict::Allowed => inner.call(req).await?,
                Verdict::Denied(reason) => handler.handle(req, reason),
            };

            evaluation.decorate(&mut response);
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{header, StatusCode};
    use http_body_util::{BodyExt, Full};
    use sealcsrf_core::{CsrfContext, FailureReason};
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    const KEY: &[u8; 32] = b"keep-it-secret-keep-it-safe-----";

    async fn echo_token(req: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, Infallible> {
        let token = CsrfContext::from_extensions(req.extensions())
            .map(|ctx| ctx.token().to_string())
            .unwrap_or_default();
        Ok(Response::new(Full::from(token)))
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn layer() -> CsrfLayer {
        CsrfLayer::new(CsrfConfig::new(KEY.to_vec())).unwrap()
    }

    #[tokio::test]
    async fn test_get_exposes_token_and_sets_cookie() {
        let svc = layer().layer(service_fn(echo_token));
        let req = Request::get("https://example.com/")
            .body(Full::default())
            .unwrap();

        let response = svc.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::VARY], "Cookie");
        assert!(response.headers().contains_key(header::SET_COOKIE));
        assert!(!body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_denied_post_uses_default_handler() {
        let svc = layer().layer(service_fn(echo_token));
        let req = Request::post("https://example.com/")
            .body(Full::default())
            .unwrap();

        let response = svc.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().contains_key(header::SET_COOKIE));
        assert_eq!(body_string(response).await, "Forbidden - CSRF token invalid");
    }

    #[tokio::test]
    async fn test_custom_handler_sees_reason_and_context() {
        let layer = layer().error_handler(|req: Request<Full<Bytes>>, reason: FailureReason| {
            let ctx = CsrfContext::from_extensions(req.extensions()).unwrap();
            assert_eq!(ctx.failure_reason(), Some(reason));
            let mut response = Response::new(Full::from(reason.code()));
            *response.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            response
        });
        let svc = layer.layer(service_fn(echo_token));

        let req = Request::post("https://example.com/")
            .body(Full::default())
            .unwrap();
        let response = svc.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_string(response).await, "no_cookie");
    }

    #[tokio::test]
    async fn test_form_body_is_forwarded_after_validation() {
        let layer = layer();
        let protector = layer.protector().clone();
        let get = protector
            .evaluate(&Request::get("https://example.com/").body(()).unwrap())
            .unwrap();
        let cookie = get.cookie().unwrap().value().to_string();
        let form = serde_urlencoded::to_string([
            ("comment", "hello"),
            ("csrf_token", get.context().token()),
        ])
        .unwrap();

        let svc = layer.layer(service_fn(|req: Request<Full<Bytes>>| async move {
            let body = req.into_body().collect().await.unwrap().to_bytes();
            Ok::<_, Infallible>(Response::new(Full::new(body)))
        }));

        let req = Request::post("https://example.com/comments")
            .header(header::COOKIE, format!("_csrf={}", cookie))
            .header(header::REFERER, "https://example.com/comments/new")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::from(form.clone()))
            .unwrap();
        let response = svc.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, form);
    }

    #[tokio::test]
    async fn test_multipart_body_is_forwarded_after_validation() {
        let layer = layer();
        let protector = layer.protector().clone();
        let get = protector
            .evaluate(&Request::get("https://example.com/").body(()).unwrap())
            .unwrap();
        let cookie = get.cookie().unwrap().value().to_string();
        let upload = format!(
            "--b0undary\r\n\
             Content-Disposition: form-data; name=\"csrf_token\"\r\n\
             \r\n\
             {}\r\n\
             --b0undary--\r\n",
            get.context().token()
        );

        let svc = layer.layer(service_fn(|req: Request<Full<Bytes>>| async move {
            let body = req.into_body().collect().await.unwrap().to_bytes();
            Ok::<_, Infallible>(Response::new(Full::new(body)))
        }));

        let req = Request::post("https://example.com/upload")
            .header(header::COOKIE, format!("_csrf={}", cookie))
            .header(header::REFERER, "https://example.com/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=b0undary")
            .body(Full::from(upload.clone()))
            .unwrap();
        let response = svc.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, upload);
    }

    #[tokio::test]
    async fn test_oversize_form_has_no_token() {
        let layer = CsrfLayer::new(CsrfConfig::new(KEY.to_vec()).max_form_bytes(16))
            .unwrap()
            .error_handler(|_req: Request<Full<Bytes>>, reason: FailureReason| {
                Response::new(Full::from(reason.code()))
            });
        let protector = layer.protector().clone();
        let get = protector
            .evaluate(&Request::get("https://example.com/").body(()).unwrap())
            .unwrap();
        let cookie = get.cookie().unwrap().value().to_string();
        let form = format!("padding={}&csrf_token={}", "x".repeat(64), get.context().token());

        let req = Request::post("https://example.com/")
            .header(header::COOKIE, format!("_csrf={}", cookie))
            .header(header::REFERER, "https://example.com/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::from(form))
            .unwrap();
        let response = layer.layer(service_fn(echo_token)).oneshot(req).await.unwrap();

        assert_eq!(body_string(response).await, "no_token");
    }
}
