use hyper::Uri;
use std::fmt;

use crate::error::{DavError, Result};

/// Absolute URI of a resource or collection on a DAV server.
///
/// The path is kept in escaped form. Collection paths end with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DavUri {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: String,
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "https" => 443,
        "http" => 80,
        _ => 0,
    }
}

impl DavUri {
    /// Parse an absolute URL (`https://host/path`) or a plain path.
    pub fn parse(url: &str, collection: bool) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(Self {
                path: normalize_path("", collection),
                ..Self::default()
            });
        }
        let uri: Uri = url
            .parse()
            .map_err(|e| DavError::Configuration(format!("invalid URL {url}: {e}")))?;
        let scheme = uri.scheme_str().unwrap_or("").to_ascii_lowercase();
        let port = uri.port_u16().unwrap_or_else(|| default_port(&scheme));
        Ok(Self {
            host: uri.host().unwrap_or("").to_ascii_lowercase(),
            port,
            path: normalize_path(uri.path(), collection),
            query: uri.query().unwrap_or("").to_string(),
            scheme,
        })
    }

    pub fn to_url(&self) -> String {
        let mut url = String::new();
        if !self.scheme.is_empty() {
            url.push_str(&self.scheme);
            url.push_str("://");
        }
        url.push_str(&self.host);
        if self.port != 0 && self.port != default_port(&self.scheme) {
            url.push(':');
            url.push_str(&self.port.to_string());
        }
        url.push_str(&self.path);
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&self.query);
        }
        url
    }

    pub fn same_authority(&self, other: &DavUri) -> bool {
        self.scheme == other.scheme && self.host == other.host && self.port == other.port
    }

    /// Same authority, different path.
    pub fn with_path(&self, path: &str) -> DavUri {
        DavUri {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
            path: path.to_string(),
            query: String::new(),
        }
    }

    /// Resolve an href or Location value against this URI. Parts missing in
    /// `reference` are taken from `self`. The resulting path is not normalized.
    pub fn resolve(&self, reference: &str) -> DavUri {
        let reference = reference.trim();
        if reference.contains("://")
            && let Ok(uri) = reference.parse::<Uri>()
        {
            let scheme = uri
                .scheme_str()
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| self.scheme.clone());
            let host = uri
                .host()
                .map(str::to_ascii_lowercase)
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| self.host.clone());
            let port = uri.port_u16().unwrap_or_else(|| {
                if scheme == self.scheme && host == self.host {
                    self.port
                } else {
                    default_port(&scheme)
                }
            });
            let path = if uri.path().is_empty() { "/" } else { uri.path() };
            return DavUri {
                scheme,
                host,
                port,
                path: path.to_string(),
                query: uri.query().unwrap_or("").to_string(),
            };
        }

        let (path, query) = reference.split_once('?').unwrap_or((reference, ""));
        let path = if path.starts_with('/') {
            path.to_string()
        } else if path.is_empty() {
            self.path.clone()
        } else {
            let dir = match self.path.rfind('/') {
                Some(idx) => &self.path[..=idx],
                None => "/",
            };
            remove_dot_segments(&format!("{dir}{path}"))
        };
        DavUri {
            query: query.to_string(),
            ..self.with_path(&path)
        }
    }

    /// Parent collection, `None` at the root.
    pub fn parent(&self) -> Option<DavUri> {
        let trimmed = self.path.trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        let idx = trimmed.rfind('/')?;
        Some(self.with_path(&trimmed[..=idx]))
    }
}

impl fmt::Display for DavUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

/// Path part of an href, which may be an absolute URL.
pub fn href_path(href: &str) -> String {
    let href = href.trim();
    if href.contains("://")
        && let Ok(uri) = href.parse::<Uri>()
    {
        return uri.path().to_string();
    }
    href.split('?').next().unwrap_or(href).to_string()
}

fn remove_dot_segments(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    let mut res = format!("/{}", out.join("/"));
    if trailing && !res.ends_with('/') {
        res.push('/');
    }
    res
}

fn keep_unescaped(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@/".contains(&b)
}

/// Percent-encode everything outside the path character set.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in text.bytes() {
        if keep_unescaped(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Decode `%XX` sequences. Malformed sequences are kept as they are.
pub fn unescape(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2]))
        {
            out.push((hi << 4) | lo);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Canonical form of a server path: leading `/`, no empty segments, each
/// segment re-escaped, trailing `/` for collections. The `%u` username
/// placeholder survives untouched.
pub fn normalize_path(path: &str, collection: bool) -> String {
    let mut res = String::with_capacity(path.len() + 2);
    res.push('/');
    let mut segments = 0;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segments > 0 {
            res.push('/');
        }
        segments += 1;
        if segment == "%u" {
            res.push_str(segment);
        } else {
            res.push_str(&escape(&unescape(segment)));
        }
    }
    if collection && segments > 0 {
        res.push('/');
    }
    res
}
