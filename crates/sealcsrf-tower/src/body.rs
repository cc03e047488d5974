//! Buffering of form bodies that may carry the token.

use bytes::Bytes;
use http_body::Body;
use http_body_util::{BodyExt, Limited};
use sealcsrf_core::FormEncoding;

/// Boxed error type used by body collection.
pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of reading a form body.
pub(crate) enum FormBody {
    /// The whole body, with its decoded pairs.
    Parsed {
        bytes: Bytes,
        pairs: Vec<(String, String)>,
    },
    /// The body could not be read within the limit. Its content is lost.
    Unreadable(BoxError),
}

/// Read up to `limit` bytes of `body` and decode the form fields in it.
///
/// Urlencoded bodies yield every pair. Multipart bodies yield only the
/// non-file parts named `field`. Undecodable content yields no pairs but
/// keeps the bytes, so the inner service still sees the original body.
pub(crate) async fn read_form<B>(
    body: B,
    limit: usize,
    encoding: &FormEncoding,
    field: &str,
) -> FormBody
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => return FormBody::Unreadable(error),
    };

    let pairs = match encoding {
        FormEncoding::UrlEncoded => {
            serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes).unwrap_or_default()
        }
        FormEncoding::Multipart { boundary } => multipart_fields(&bytes, boundary, field),
    };
    FormBody::Parsed { bytes, pairs }
}

/// Text parts of a `multipart/form-data` body named `field`.
fn multipart_fields(body: &[u8], boundary: &str, field: &str) -> Vec<(String, String)> {
    let delimiter = format!("--{}", boundary);
    let text = String::from_utf8_lossy(body);

    let mut fields = Vec::new();
    for part in text.split(delimiter.as_str()).skip(1) {
        let part = part.trim_start_matches("\r\n").trim_start_matches('\n');
        if part.is_empty() || part.starts_with("--") {
            continue;
        }

        let Some((head, value)) = part
            .split_once("\r\n\r\n")
            .or_else(|| part.split_once("\n\n"))
        else {
            continue;
        };

        if part_name(head).as_deref() != Some(field) {
            continue;
        }

        // The line break before the next delimiter belongs to the delimiter.
        let value = value
            .strip_suffix("\r\n")
            .or_else(|| value.strip_suffix('\n'))
            .unwrap_or(value);
        fields.push((field.to_string(), value.to_string()));
    }
    fields
}

/// `name` of a part from its `Content-Disposition` header. File parts have
/// none.
fn part_name(head: &str) -> Option<String> {
    let disposition = head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case("content-disposition")
            .then_some(value)
    })?;

    let mut name = None;
    for param in disposition.split(';').map(str::trim) {
        if param.starts_with("filename=") || param.starts_with("filename*=") {
            return None;
        }
        if let Some(value) = param.strip_prefix("name=") {
            name = Some(value.trim_matches('"').to_string());
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    const UPLOAD: &str = "--XX\r\n\
        Content-Disposition: form-data; name=\"title\"\r\n\
        \r\n\
        holiday\r\n\
        --XX\r\n\
        Content-Disposition: form-data; name=\"csrf_token\"; filename=\"t.txt\"\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        from-a-file\r\n\
        --XX\r\n\
        Content-Disposition: form-data; name=\"csrf_token\"\r\n\
        \r\n\
        abc-DEF_123\r\n\
        --XX--\r\n";

    #[tokio::test]
    async fn test_reads_pairs() {
        let body = Full::new(Bytes::from_static(b"name=alice&csrf_token=abc%2Bdef"));

        match read_form(body, 1024, &FormEncoding::UrlEncoded, "csrf_token").await {
            FormBody::Parsed { bytes, pairs } => {
                assert_eq!(&bytes[..], b"name=alice&csrf_token=abc%2Bdef");
                assert_eq!(pairs[1], ("csrf_token".to_string(), "abc+def".to_string()));
            }
            FormBody::Unreadable(error) => panic!("unexpected error: {}", error),
        }
    }

    #[tokio::test]
    async fn test_reads_multipart_field() {
        let encoding = FormEncoding::Multipart {
            boundary: "XX".to_string(),
        };

        let body = Full::new(Bytes::from_static(UPLOAD.as_bytes()));

        match read_form(body, 1024, &encoding, "csrf_token").await {
            FormBody::Parsed { bytes, pairs } => {
                assert_eq!(&bytes[..], UPLOAD.as_bytes());
                assert_eq!(
                    pairs,
                    vec![("csrf_token".to_string(), "abc-DEF_123".to_string())]
                );
            }
            FormBody::Unreadable(error) => panic!("unexpected error: {}", error),
        }
    }

    #[test]
    fn test_multipart_without_field() {
        assert!(multipart_fields(UPLOAD.as_bytes(), "XX", "_token").is_empty());
        assert!(multipart_fields(UPLOAD.as_bytes(), "YY", "csrf_token").is_empty());
        assert!(multipart_fields(b"not multipart at all", "XX", "csrf_token").is_empty());
    }

    #[test]
    fn test_multipart_bare_newlines() {
        let body = "--b\nContent-Disposition: form-data; name=\"csrf_token\"\n\ntok\n--b--\n";
        assert_eq!(
            multipart_fields(body.as_bytes(), "b", "csrf_token"),
            vec![("csrf_token".to_string(), "tok".to_string())]
        );
    }

    #[tokio::test]
    async fn test_oversize_body_is_unreadable() {
        let body = Full::new(Bytes::from(vec![b'a'; 2048]));
        assert!(matches!(
            read_form(body, 1024, &FormEncoding::UrlEncoded, "csrf_token").await,
            FormBody::Unreadable(_)
        ));
    }
}
