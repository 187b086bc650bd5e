//! Request and response types shared by the router, policies, and stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HTTP methods the worker can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
}

impl Method {
    /// Only GET requests participate in caching.
    pub fn is_get(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        };
        write!(f, "{}", name)
    }
}

/// Case-insensitive header lookup over a header list.
fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// An intercepted resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// A page navigation: the caller expects an HTML document.
    pub fn navigation(url: impl Into<String>) -> Self {
        Self::get(url).with_header("accept", "text/html,application/xhtml+xml")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value, case-insensitive on the name.
    /// Returns `None` when the header is absent; callers must not assume
    /// any header is present on every request.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// The cache key identifying this request.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            method: self.method,
            url: self.url.clone(),
        }
    }
}

/// Cache key: method + absolute URL, verbatim.
///
/// Query strings and fragments are significant. No normalization is
/// performed, so `/tiles/14/1/2.png` and `/tiles/14/1/2.png?v=2` are
/// distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    method: Method,
    url: String,
}

impl Fingerprint {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A stored response: status, headers, and the body read to completion.
///
/// A network body stream can be consumed exactly once; it is read into the
/// snapshot at the fetch boundary, and the copy written to a store is always
/// a clone of the copy returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            fetched_at: Utc::now(),
        }
    }

    /// Synthetic "tile unavailable" response: empty body, not-found status.
    pub fn not_found() -> Self {
        Self::new(404, Vec::new(), Vec::new())
    }

    /// Look up a response header value, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

// ============================================================================
// Tests
// ============================================================================
