//! A CalDAV or CardDAV collection exposed as a revision-tracked item source.
//!
//! [`DavSource`] ties everything together: it finds the collection through
//! [`Discovery`](crate::discovery::Discovery), maps LUIDs to resources and
//! answers reads through the read-ahead cache.

mod batch;
mod items;
pub mod mapping;

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::common::http::{HyperClient, TlsOptions, build_hyper_client};
use crate::config::{DavSettings, UrlFlags};
use crate::content::ContentKind;
use crate::discovery::{Discovery, ProviderQuirk, ServiceLocator, SrvLocator, default_quirks};
use crate::error::{DavError, Result};
use crate::readahead::{ReadAheadCache, TrackedItems};
use crate::webdav::multistatus::{DavProps, DavResource};
use crate::webdav::session::DavSession;
use crate::webdav::types::{DavRequest, Depth};
use crate::webdav::uri::{DavUri, escape, href_path, normalize_path};
use crate::webdav::xml::build_ctag_body;

pub use items::{InsertItemResult, InsertState};
pub use mapping::{etag_to_revision, luid_to_path, path_to_luid};

/// LUID to revision string, ordered by LUID.
pub type RevisionMap = BTreeMap<String, String>;

/// Shown by [`DavSource::get_databases`] when no scan is possible.
pub const PLACEHOLDER_DATABASE: &str = "select database via absolute URL, set username/password to scan, set syncURL to base URL if server does not support auto-discovery";

/// A collection offered for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub name: String,
    pub url: String,
    pub is_default: bool,
    pub read_only: bool,
}

impl Database {
    fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_DATABASE.to_string(),
            url: "<path>".to_string(),
            is_default: false,
            read_only: false,
        }
    }
}

/// Properties the server returned for exactly `path`.
fn props_for<'r>(resources: &'r [DavResource], path: &str) -> Option<&'r DavProps> {
    let wanted = normalize_path(path, true);
    resources
        .iter()
        .find(|r| normalize_path(&href_path(&r.href), true) == wanted)
        .map(|r| &r.props)
}

pub struct DavSource {
    kind: ContentKind,
    settings: DavSettings,
    flags: UrlFlags,
    client: HyperClient,
    session: Option<DavSession>,
    collection: Option<DavUri>,
    /// `add-member` target: `None` until checked, `Some(None)` without support.
    post_path: Option<Option<String>>,
    locator: Box<dyn ServiceLocator>,
    quirks: Vec<ProviderQuirk>,
    readahead: ReadAheadCache,
    tracked: TrackedItems,
}

impl DavSource {
    pub fn new(kind: ContentKind, settings: DavSettings) -> Result<Self> {
        let client = build_hyper_client(TlsOptions {
            verify_certificate: settings.verify_ssl_certificate,
            verify_host: settings.verify_ssl_host,
        })
        .map_err(|e| DavError::Configuration(format!("cannot set up HTTP client: {e:#}")))?;
        Ok(Self {
            kind,
            flags: UrlFlags::default(),
            client,
            session: None,
            collection: None,
            post_path: None,
            locator: Box::new(SrvLocator),
            quirks: default_quirks(),
            readahead: ReadAheadCache::new(settings.batch_size()),
            tracked: TrackedItems::default(),
            settings,
        })
    }

    /// Replace the DNS-based service lookup.
    pub fn with_locator(mut self, locator: Box<dyn ServiceLocator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_quirks(mut self, quirks: Vec<ProviderQuirk>) -> Self {
        self.quirks = quirks;
        self
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn settings(&self) -> &DavSettings {
        &self.settings
    }

    pub fn flags(&self) -> UrlFlags {
        self.flags
    }

    /// Collection all item operations work on, once known.
    pub fn collection(&self) -> Option<&DavUri> {
        self.collection.as_ref()
    }

    /// Collection URL to persist, see [`DavSource::end_sync`].
    pub fn database_id(&self) -> &str {
        &self.settings.database_id
    }

    /// Check the configuration. Nothing is sent to the server.
    pub fn open(&mut self) -> Result<()> {
        self.flags = self.settings.validate()?;
        debug!(kind = ?self.kind, flags = ?self.flags, "source opened");
        Ok(())
    }

    pub fn close(&mut self) {
        self.session = None;
        self.collection = None;
        self.post_path = None;
        self.readahead.clear();
    }

    pub async fn begin_sync(&mut self) -> Result<()> {
        self.contact_server().await
    }

    /// Remember the collection that was used, unless one was configured.
    pub fn end_sync(&mut self, success: bool) {
        if !success || !self.settings.database_id.is_empty() {
            return;
        }
        if let Some(collection) = &self.collection {
            info!("remembering {collection} as database");
            self.settings.database_id = collection.to_url();
        }
    }

    /// Resolve the collection and open a session for it. Does nothing when
    /// that already happened.
    pub async fn contact_server(&mut self) -> Result<()> {
        if self.collection.is_some() && self.session.is_some() {
            return Ok(());
        }
        self.post_path = None;

        let database = self.settings.database_id.trim();
        if !database.is_empty() {
            let database = database.replace("%u", &escape(self.settings.username()));
            let collection = DavUri::parse(&database, true)?;
            debug!(%collection, "using configured database");
            self.session = Some(DavSession::new(
                self.client.clone(),
                collection.with_path("/"),
                &self.settings,
            )?);
            self.collection = Some(collection);
            return Ok(());
        }

        let mut chosen: Option<DavUri> = None;
        let mut fallback: Option<DavUri> = None;
        let discovery = Discovery {
            kind: self.kind,
            settings: &self.settings,
            client: &self.client,
            locator: self.locator.as_ref(),
            quirks: &self.quirks,
        };
        discovery
            .find_collections(&mut self.session, |_, uri, read_only| {
                if read_only {
                    if fallback.is_none() {
                        debug!("remembering read-only {uri}, looking for a writable collection");
                        fallback = Some(uri.clone());
                    }
                    true
                } else {
                    chosen = Some(uri.clone());
                    false
                }
            })
            .await?;

        let collection = chosen
            .or(fallback)
            .ok_or_else(|| DavError::DiscoveryExhausted("no database found".to_string()))?;
        info!("picked final path {}", collection.path);

        let reopen = match &self.session {
            Some(session) if session.uri().same_authority(&collection) => None,
            Some(session) => Some(session.reopen(collection.with_path("/"))),
            None => Some(DavSession::new(
                self.client.clone(),
                collection.with_path("/"),
                &self.settings,
            )?),
        };
        if let Some(session) = reopen {
            self.session = Some(session);
        }
        self.collection = Some(collection);
        Ok(())
    }

    /// All collections of the configured kind. Without credentials only a
    /// placeholder entry is returned.
    pub async fn get_databases(&mut self) -> Result<Vec<Database>> {
        if !self.settings.has_credentials() {
            return Ok(vec![Database::placeholder()]);
        }

        let mut result: Vec<Database> = Vec::new();
        let discovery = Discovery {
            kind: self.kind,
            settings: &self.settings,
            client: &self.client,
            locator: self.locator.as_ref(),
            quirks: &self.quirks,
        };
        discovery
            .find_collections(&mut self.session, |name, uri, read_only| {
                let url = uri.to_url();
                if !result.iter().any(|db| db.url == url) {
                    result.push(Database {
                        name: name.to_string(),
                        url,
                        is_default: false,
                        read_only,
                    });
                }
                true
            })
            .await?;

        result.sort_by_key(|db| db.read_only);
        if let Some(first) = result.first_mut() {
            first.is_default = true;
        }
        Ok(result)
    }

    pub async fn is_empty(&mut self) -> Result<bool> {
        Ok(self.list_all_items().await?.is_empty())
    }

    /// Change tag of the whole collection. Empty when the server has none
    /// or when CTag use is disabled by the `NoCTag` flag.
    pub async fn database_revision(&mut self) -> Result<String> {
        if self.flags.no_ctag {
            return Ok(String::new());
        }
        self.contact_server().await?;

        let (session, collection) = self.connection()?;
        let deadline = session.deadline();
        debug!("read ctag of {}", collection.path);
        let resources = session
            .execute("PROPFIND", deadline, |_| {
                DavRequest::propfind(&collection.path, Depth::Zero, build_ctag_body())
            })
            .await?
            .ensure_success("PROPFIND")?
            .multistatus()?;
        Ok(props_for(&resources, &collection.path)
            .and_then(|props| props.ctag.clone())
            .unwrap_or_default())
    }

    /// Session and collection, which exist after [`DavSource::contact_server`].
    fn connection(&mut self) -> Result<(&mut DavSession, &DavUri)> {
        match (self.session.as_mut(), self.collection.as_ref()) {
            (Some(session), Some(collection)) => Ok((session, collection)),
            _ => Err(DavError::Configuration(
                "not connected to a collection".to_string(),
            )),
        }
    }
}
