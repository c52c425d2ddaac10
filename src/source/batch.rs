use tracing::debug;

use super::DavSource;
use super::mapping::{luid_to_path, path_to_luid};
use crate::error::Result;
use crate::readahead::{CacheStats, ReadAheadOrder, TrackedItems};
use crate::webdav::types::{DavRequest, Depth};
use crate::webdav::uri::href_path;
use crate::webdav::xml::build_multiget_body;

impl DavSource {
    /// Announce which items will be read next. `luids` is only used with
    /// [`ReadAheadOrder::SelectedItems`]. Cached items are dropped.
    pub fn set_read_ahead_order(&mut self, order: ReadAheadOrder, luids: Vec<String>) {
        self.readahead.set_order(order, luids);
    }

    /// Current order and the LUIDs it was set with.
    pub fn read_ahead_order(&self) -> (ReadAheadOrder, &[String]) {
        (self.readahead.order(), self.readahead.selected())
    }

    /// Item sets used to predict reads for [`ReadAheadOrder::AllItems`] and
    /// [`ReadAheadOrder::ChangedItems`].
    pub fn set_tracked_items(&mut self, items: TrackedItems) {
        self.tracked = items;
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.readahead.stats()
    }

    /// Payload of one item, from the read-ahead cache when possible.
    pub async fn read_item(&mut self, luid: &str) -> Result<String> {
        self.readahead.count_read();
        let result = self.read_item_internal(luid).await;
        self.readahead.log_stats();
        result
    }

    async fn read_item_internal(&mut self, luid: &str) -> Result<String> {
        self.contact_server().await?;

        if let Some(cached) = self.readahead.lookup(luid) {
            return cached;
        }
        if self.readahead.order() != ReadAheadOrder::None
            && let Some(batch) = self.readahead.plan_batch(luid, &self.tracked)
        {
            self.read_batch(&batch).await?;
            if let Some(cached) = self.readahead.lookup(luid) {
                return cached;
            }
        }

        self.readahead.count_query(1);
        self.fetch_item(luid).await
    }

    /// Fetch `luids` with one multi-get and make them the cache content.
    async fn read_batch(&mut self, luids: &[String]) -> Result<()> {
        self.readahead.clear();
        self.readahead.count_query(luids.len());

        let kind = self.kind;
        let (session, collection) = self.connection()?;
        let hrefs: Vec<String> = luids
            .iter()
            .map(|luid| luid_to_path(collection, luid))
            .collect();
        let Some(body) = build_multiget_body(kind, &hrefs) else {
            return Ok(());
        };
        debug!(items = luids.len(), "reading batch of items");

        let deadline = session.deadline();
        let resources = session
            .execute("REPORT", deadline, |_| {
                DavRequest::report(&collection.path, Depth::Zero, body.clone())
            })
            .await?
            .ensure_success("REPORT")?
            .multistatus()?;
        let fetched: Vec<(String, Option<String>)> = resources
            .into_iter()
            .map(|resource| {
                let luid = path_to_luid(collection, &href_path(&resource.href));
                let ok = resource.status.is_none_or(|s| (200..300).contains(&s));
                let data = resource.props.data.filter(|data| ok && !data.is_empty());
                (luid, data)
            })
            .collect();

        self.readahead.install(luids, fetched);
        Ok(())
    }
}
