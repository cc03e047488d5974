//! Referer validation for unsafe requests.

use crate::config::{CsrfConfig, TrustedOriginsCallback};
use crate::error::FailureReason;
use crate::request::CsrfRequest;
use http::header;
use url::{Origin, Url};

/// Decides whether the Referer of a request comes from a trusted origin.
#[derive(Clone)]
pub struct OriginValidator {
    trusted_hosts: Vec<String>,
    callback: Option<TrustedOriginsCallback>,
    default_scheme: &'static str,
}

impl OriginValidator {
    /// Build a validator from the trust settings of `config`.
    pub fn new(config: &CsrfConfig) -> Self {
        Self {
            trusted_hosts: config
                .trusted_origins
                .iter()
                .filter(|origin| !origin.contains("://"))
                .cloned()
                .collect(),
            callback: config.trusted_origins_callback.clone(),
            default_scheme: if config.cookie_secure { "https" } else { "http" },
        }
    }

    /// The request's own origin.
    ///
    /// Taken from an absolute request URI, otherwise from the `Host` header
    /// with the default scheme (https when cookies are `Secure`).
    pub fn request_origin(&self, req: &dyn CsrfRequest) -> Option<Origin> {
        let uri = req.uri();
        let scheme = uri.scheme_str().unwrap_or(self.default_scheme);
        let authority = match uri.authority() {
            Some(authority) => authority.as_str(),
            None => req.headers().get(header::HOST)?.to_str().ok()?,
        };

        Url::parse(&format!("{}://{}", scheme, authority))
            .ok()
            .map(|url| url.origin())
    }

    /// Check the Referer of `req`, naming the failure if untrusted.
    pub fn check(&self, req: &dyn CsrfRequest) -> Result<(), FailureReason> {
        let referer = match req.headers().get(header::REFERER) {
            None => return Err(FailureReason::NoReferer),
            Some(value) if value.is_empty() => return Err(FailureReason::NoReferer),
            Some(value) => value.to_str().map_err(|_| FailureReason::BadReferer)?,
        };

        let referer = Url::parse(referer).map_err(|_| FailureReason::BadReferer)?;
        let request_origin = self.request_origin(req);

        if self.is_trusted(request_origin.as_ref(), &referer, req) {
            Ok(())
        } else {
            Err(FailureReason::BadReferer)
        }
    }

    /// Whether `referer` is trusted for a request from `request_origin`.
    ///
    /// Same scheme, host and port are always trusted. Otherwise the callback
    /// decides when configured, else the Referer host must equal a trusted
    /// host entry exactly.
    pub fn is_trusted(
        &self,
        request_origin: Option<&Origin>,
        referer: &Url,
        req: &dyn CsrfRequest,
    ) -> bool {
        let referer_origin = referer.origin();
        if referer_origin.is_tuple() && request_origin == Some(&referer_origin) {
            return true;
        }

        if let Some(callback) = &self.callback {
            return callback(referer, req);
        }

        let Some(host) = referer.host_str() else {
            return false;
        };
        let host = match referer.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        self.trusted_hosts
            .iter()
            .any(|trusted| trusted.eq_ignore_ascii_case(&host))
    }
}
