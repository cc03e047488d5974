//! The view of an inbound request that the pipeline needs.

use http::{request::Parts, Extensions, HeaderMap, Method, Request, Uri};

/// An HTTP-like request as seen by the CSRF pipeline.
///
/// Implemented for [`http::Request`], [`http::request::Parts`] and
/// [`FormRequest`]. Only `FormRequest` exposes form values; the others rely
/// on the header token alone.
pub trait CsrfRequest {
    /// Request method
    fn method(&self) -> &Method;

    /// Request URI, absolute or origin-form
    fn uri(&self) -> &Uri;

    /// Request headers
    fn headers(&self) -> &HeaderMap;

    /// Request extensions
    fn extensions(&self) -> &Extensions;

    /// Value of a decoded form field, if the body was parsed.
    fn form_value(&self, _name: &str) -> Option<&str> {
        None
    }
}

impl<B> CsrfRequest for Request<B> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn uri(&self) -> &Uri {
        Request::uri(self)
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn extensions(&self) -> &Extensions {
        Request::extensions(self)
    }
}

impl CsrfRequest for Parts {
    fn method(&self) -> &Method {
        &self.method
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}

/// How a form body that may carry the token is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEncoding {
    /// `application/x-www-form-urlencoded`
    UrlEncoded,
    /// `multipart/form-data` with its part boundary
    Multipart { boundary: String },
}

impl FormEncoding {
    /// Encoding named by a `Content-Type` value.
    ///
    /// `None` for other media types and for multipart without a boundary.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mut params = content_type.split(';');
        let mime = params.next()?.trim();

        if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            return Some(Self::UrlEncoded);
        }
        if !mime.eq_ignore_ascii_case("multipart/form-data") {
            return None;
        }

        params.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("boundary") {
                return None;
            }
            let boundary = value.trim().trim_matches('"');
            (!boundary.is_empty()).then(|| Self::Multipart {
                boundary: boundary.to_string(),
            })
        })
    }
}

/// Request head paired with the decoded fields of its form body.
#[derive(Debug, Clone, Copy)]
pub struct FormRequest<'a> {
    parts: &'a Parts,
    form: &'a [(String, String)],
}

impl<'a> FormRequest<'a> {
    /// Pair request parts with form pairs.
    pub fn new(parts: &'a Parts, form: &'a [(String, String)]) -> Self {
        Self { parts, form }
    }
}

impl CsrfRequest for FormRequest<'_> {
    fn method(&self) -> &Method {
        &self.parts.method
    }

    fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}
