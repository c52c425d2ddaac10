//! CalDAV/CardDAV collection source for revision-tracked synchronization.
//!
//! This library turns one calendar or address book on a DAV server into an
//! item source with stable local identifiers (LUIDs) and revision strings,
//! built on hyper 1.x, rustls and tokio.
//!
//! # Features
//!
//! - Collection discovery from a base URL, `/.well-known/` paths or DNS
//!   SRV/TXT records, following redirects, principals and home-sets
//! - LUID and revision mapping derived from resource paths and ETags
//! - Create, update, read and delete with conflict detection (`If-None-Match`,
//!   UID lookups) and server-side renames
//! - Batched read-ahead through `calendar-multiget` / `addressbook-multiget`
//! - Transparent resending of requests on transient failures, bounded by a
//!   per-operation deadline
//! - Automatic response decompression (br/zstd/gzip)
//!
//! # Examples
//!
//! ## Listing and reading contacts
//!
//! ```no_run
//! use fast_dav_sync::{ContentKind, DavSettings, DavSource, ReadAheadOrder, TrackedItems};
//!
//! #[tokio::main]
//! async fn main() -> fast_dav_sync::Result<()> {
//!     let settings = DavSettings {
//!         sync_urls: vec!["https://dav.example.com/".to_string()],
//!         username: Some("alice".to_string()),
//!         password: Some("secret".to_string()),
//!         ..DavSettings::default()
//!     };
//!
//!     let mut source = DavSource::new(ContentKind::Card, settings)?;
//!     source.open()?;
//!     source.begin_sync().await?;
//!
//!     let revisions = source.list_all_items().await?;
//!     source.set_tracked_items(TrackedItems {
//!         all: revisions.keys().cloned().collect(),
//!         ..TrackedItems::default()
//!     });
//!     source.set_read_ahead_order(ReadAheadOrder::AllItems, Vec::new());
//!     for (luid, revision) in &revisions {
//!         let vcard = source.read_item(luid).await?;
//!         println!("{luid} @ {revision}: {} bytes", vcard.len());
//!     }
//!
//!     source.end_sync(true);
//!     println!("remember database {}", source.database_id());
//!     Ok(())
//! }
//! ```
//!
//! ## Creating an event
//!
//! ```no_run
//! use fast_dav_sync::{ContentKind, DavSettings, DavSource, InsertState};
//!
//! # async fn example(settings: DavSettings) -> fast_dav_sync::Result<()> {
//! let mut source = DavSource::new(ContentKind::Event, settings)?;
//! source.open()?;
//!
//! let ics = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nSUMMARY:standup\r\n\
//!            DTSTART:20250101T090000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
//! let result = source.insert_item("", ics).await?;
//! match result.state {
//!     InsertState::Okay => println!("stored as {} rev {}", result.luid, result.revision),
//!     InsertState::NeedsMerge => println!("already exists as {}", result.luid),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Choosing a collection
//!
//! ```no_run
//! # use fast_dav_sync::{ContentKind, DavSettings, DavSource};
//! # async fn example(settings: DavSettings) -> fast_dav_sync::Result<()> {
//! let mut source = DavSource::new(ContentKind::Todo, settings)?;
//! for db in source.get_databases().await? {
//!     let marker = if db.is_default { "*" } else { " " };
//!     let access = if db.read_only { "read-only" } else { "read-write" };
//!     println!("{marker} {} <{}> ({access})", db.name, db.url);
//! }
//! # Ok(())
//! # }
//! ```
pub mod common;
pub mod config;
pub mod content;
pub mod discovery;
pub mod error;
pub mod readahead;
pub mod source;
pub mod uid;
pub mod webdav;

pub use config::{DavSettings, UrlFlags};
pub use content::ContentKind;
pub use discovery::{Discovery, ProviderQuirk, ServiceLocator, SrvLocator};
pub use error::{DavError, Result};
pub use readahead::{CacheStats, ReadAheadCache, ReadAheadOrder, TrackedItems};
pub use source::{
    Database, DavSource, InsertItemResult, InsertState, PLACEHOLDER_DATABASE, RevisionMap,
};
pub use webdav::{DavUri, Depth};
