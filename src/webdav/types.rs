use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode, header};

use crate::error::{DavError, Result};
use crate::webdav::multistatus::{DavResource, parse_multistatus};

/// WebDAV Depth
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
}
impl Depth {
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
        }
    }
}

fn webdav_method(name: &'static str) -> Method {
    Method::from_bytes(name.as_bytes()).unwrap_or(Method::GET)
}

/// One logical request. The session may send it several times.
#[derive(Debug, Clone)]
pub struct DavRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl DavRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn propfind(path: &str, depth: Depth, xml: String) -> Self {
        Self::new(webdav_method("PROPFIND"), path)
            .with_header("Depth", depth.as_str())
            .with_body(xml)
    }

    pub fn report(path: &str, depth: Depth, xml: String) -> Self {
        Self::new(webdav_method("REPORT"), path)
            .with_header("Depth", depth.as_str())
            .with_body(xml)
    }

    pub fn get(path: &str, accept: &str) -> Self {
        Self::new(Method::GET, path).with_header("Accept", accept)
    }

    pub fn put(path: &str, content_type: &str, payload: &str) -> Self {
        Self::new(Method::PUT, path)
            .with_header("Content-Type", content_type)
            .with_body(payload.to_string())
    }

    pub fn post(path: &str, content_type: &str, payload: &str) -> Self {
        Self::new(Method::POST, path)
            .with_header("Content-Type", content_type)
            .with_body(payload.to_string())
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Invalid header values are dropped; all values used here are static
    /// or come from already validated content types.
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = header::HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(Bytes::from(body));
        self
    }
}

/// Aggregated, decoded response.
#[derive(Debug, Clone)]
pub struct DavResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl DavResponse {
    pub fn header_str(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn etag(&self) -> Option<&str> {
        self.header_str(header::ETAG)
    }

    pub fn location(&self) -> Option<&str> {
        self.header_str(header::LOCATION)
    }

    /// Turn any non-2xx status into the matching error.
    pub fn ensure_success(self, operation: &str) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(DavError::from_status(operation, self.status.as_u16()))
        }
    }

    pub fn multistatus(&self) -> Result<Vec<DavResource>> {
        parse_multistatus(&self.body)
    }
}

/// Result of sending a request: either a final response or a redirect the
/// caller may follow.
#[derive(Debug, Clone)]
pub enum DavOutcome {
    Response(DavResponse),
    Redirect { status: u16, location: String },
}
