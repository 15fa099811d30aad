//! HTTP wire types exchanged between the executor and the transport.
//!
//! # Design
//! Requests and responses are plain data. The executor builds an
//! `HttpRequest`, a `Transport` performs the round-trip, and the executor
//! parses the resulting `HttpResponse`. Building and parsing therefore stay
//! deterministic and testable without a network.
//!
//! Header names are stored lower-case so lookups never depend on how the
//! server capitalised them.

use std::time::Duration;

use crate::multipart::MultipartForm;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Request payload. Multipart forms stay structured until the transport
/// encodes them, which also picks the boundary and the Content-Type.
#[derive(Debug, Clone)]
pub enum HttpBody {
    Bytes(Vec<u8>),
    Multipart(MultipartForm),
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<HttpBody>,
    /// Upper bound for the whole round-trip; exceeding it aborts the request.
    pub timeout: Duration,
    /// Largest response body the transport will buffer.
    pub max_response_bytes: u64,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Raw payload, if the body is not a multipart form.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Some(HttpBody::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the content type names a JSON media type.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
    }
}

/// Query parameter carrying the cache-busting timestamp.
pub const CACHE_BUST_PARAM: &str = "_t";

/// Headers that disable HTTP caching on every hop.
pub fn no_cache_headers() -> Vec<(String, String)> {
    [
        ("Cache-Control", "no-cache, no-store, must-revalidate"),
        ("Pragma", "no-cache"),
        ("Expires", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Append `_t=<unix millis>` to `url`, respecting an existing query string.
pub fn cache_busted(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{url}{separator}{CACHE_BUST_PARAM}={}",
        chrono::Utc::now().timestamp_millis()
    )
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: Option<&str>) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: content_type
                .map(|ct| vec![("Content-Type".to_string(), ct.to_string())])
                .unwrap_or_default(),
            body: String::new(),
        }
    }

    #[test]
    fn header_lookup_ignores_case() {
        let resp = response(Some("application/json"));
        assert_eq!(resp.header("content-type"), Some("application/json"));
        assert_eq!(resp.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn json_detection_accepts_charset_suffix() {
        assert!(response(Some("application/json; charset=utf-8")).is_json());
        assert!(!response(Some("text/html")).is_json());
        assert!(!response(None).is_json());
    }

    #[test]
    fn cache_buster_picks_separator() {
        assert!(cache_busted("http://h/api/documents").starts_with("http://h/api/documents?_t="));
        assert!(cache_busted("http://h/api/documents?page=2")
            .starts_with("http://h/api/documents?page=2&_t="));
    }

    #[test]
    fn no_cache_headers_cover_all_directives() {
        let headers = no_cache_headers();
        assert_eq!(
            find_header(&headers, "cache-control"),
            Some("no-cache, no-store, must-revalidate")
        );
        assert_eq!(find_header(&headers, "pragma"), Some("no-cache"));
        assert_eq!(find_header(&headers, "expires"), Some("0"));
    }

    #[test]
    fn success_range_is_2xx() {
        let mut resp = response(None);
        resp.status = 204;
        assert!(resp.is_success());
        resp.status = 304;
        assert!(!resp.is_success());
    }
}
