//! Settings consumed by a collection source.
//!
//! Settings usually come from the surrounding sync configuration; for
//! standalone use they can also be loaded from TOML:
//!
//! ```
//! use fast_dav_sync::DavSettings;
//!
//! let settings = DavSettings::from_toml_str(
//!     r#"
//!     sync_urls = ["https://dav.example.com/"]
//!     username = "alice@example.com"
//!     password = "secret"
//!     "#,
//! ).unwrap();
//! assert_eq!(settings.read_ahead_batch_size, 50);
//! ```

use serde::Deserialize;
use std::time::Duration;

use crate::error::{DavError, Result};

/// Query parameter carrying provider flags inside a sync URL.
pub const FLAGS_PARAMETER: &str = "SyncFlags";

/// Longest duration taken from the settings; larger values are clamped.
pub const MAX_DURATION_SECS: u64 = 366 * 24 * 60 * 60;

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.min(MAX_DURATION_SECS))
}

fn default_true() -> bool {
    true
}

fn default_retry_duration() -> u64 {
    300
}

fn default_retry_interval() -> u64 {
    120
}

fn default_request_timeout() -> u64 {
    20
}

fn default_batch_size() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct DavSettings {
    /// Base URLs to start discovery from. May be empty when the username
    /// carries a domain usable for DNS service discovery.
    #[serde(default)]
    pub sync_urls: Vec<String>,

    /// Collection URL chosen earlier; bypasses discovery when set.
    #[serde(default)]
    pub database_id: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default = "default_true")]
    pub verify_ssl_certificate: bool,

    #[serde(default = "default_true")]
    pub verify_ssl_host: bool,

    /// Total time budget for resending one request; zero disables resending.
    #[serde(default = "default_retry_duration")]
    pub retry_duration_secs: u64,

    /// Sync-level retry interval. WebDAV requests are resent at 1/24 of it.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum number of items fetched by one multi-get query.
    #[serde(default = "default_batch_size")]
    pub read_ahead_batch_size: usize,
}

impl Default for DavSettings {
    fn default() -> Self {
        Self {
            sync_urls: Vec::new(),
            database_id: String::new(),
            username: None,
            password: None,
            proxy: None,
            verify_ssl_certificate: true,
            verify_ssl_host: true,
            retry_duration_secs: default_retry_duration(),
            retry_interval_secs: default_retry_interval(),
            request_timeout_secs: default_request_timeout(),
            read_ahead_batch_size: default_batch_size(),
        }
    }
}

impl DavSettings {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| DavError::Configuration(e.to_string()))
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    /// Whether a scan of the server is possible at all.
    pub fn has_credentials(&self) -> bool {
        !self.username().is_empty() || !self.password().is_empty()
    }

    pub fn retry_duration(&self) -> Duration {
        secs(self.retry_duration_secs)
    }

    /// Interval between resends of one request (1/24 of the sync retry
    /// interval, so the default two minutes become five seconds).
    pub fn resend_interval(&self) -> Duration {
        secs(self.retry_interval_secs / 24)
    }

    pub fn request_timeout(&self) -> Duration {
        secs(self.request_timeout_secs.max(1))
    }

    pub fn batch_size(&self) -> usize {
        self.read_ahead_batch_size.max(1)
    }

    /// Checks that are cheap and independent of the server.
    pub fn validate(&self) -> Result<UrlFlags> {
        if let Some(proxy) = self.proxy.as_deref().filter(|p| !p.is_empty()) {
            return Err(DavError::Configuration(format!(
                "proxy {proxy} configured, but proxies are not supported by this transport"
            )));
        }
        let mut flags = UrlFlags::default();
        for url in &self.sync_urls {
            let (_, parsed) = UrlFlags::split(url)?;
            flags.merge(parsed);
        }
        Ok(flags)
    }
}

/// Provider workarounds requested through the sync URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlFlags {
    pub update_hack: bool,
    pub child_hack: bool,
    pub alarm_hack: bool,
    pub no_ctag: bool,
}

impl UrlFlags {
    /// Split the flag parameter off `url`. Returns the URL without query and
    /// the flags found in it.
    pub fn split(url: &str) -> Result<(String, UrlFlags)> {
        let without_fragment = url.split('#').next().unwrap_or(url);
        let Some((base, query)) = without_fragment.split_once('?') else {
            return Ok((without_fragment.to_string(), UrlFlags::default()));
        };

        let mut flags = UrlFlags::default();
        for param in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = param.split_once('=').unwrap_or((param, ""));
            if key != FLAGS_PARAMETER {
                return Err(DavError::Configuration(format!(
                    "unknown parameter {key} in URL {url}"
                )));
            }
            for flag in value.split(',').filter(|f| !f.is_empty()) {
                match flag {
                    "UpdateHack" => flags.update_hack = true,
                    "ChildHack" => flags.child_hack = true,
                    "AlarmHack" => flags.alarm_hack = true,
                    "NoCTag" => flags.no_ctag = true,
                    "Google" => {
                        flags.update_hack = true;
                        flags.child_hack = true;
                        flags.alarm_hack = true;
                    }
                    other => {
                        return Err(DavError::Configuration(format!(
                            "unknown flag {other} in URL {url}"
                        )));
                    }
                }
            }
        }
        Ok((base.to_string(), flags))
    }

    fn merge(&mut self, other: UrlFlags) {
        self.update_hack |= other.update_hack;
        self.child_hack |= other.child_hack;
        self.alarm_hack |= other.alarm_hack;
        self.no_ctag |= other.no_ctag;
    }
}
