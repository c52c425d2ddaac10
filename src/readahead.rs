//! Batched read-ahead of item payloads.
//!
//! The cache itself never talks to the server. It decides which items to ask
//! for together ([`ReadAheadCache::plan_batch`]), stores what a multi-get
//! returned ([`ReadAheadCache::install`]) and answers later reads from that.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use tracing::debug;

use crate::error::{DavError, Result};

/// Which items the caller is about to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadAheadOrder {
    /// No prediction, every read goes to the server on its own.
    #[default]
    None,
    /// Everything in [`TrackedItems::all`], in listing order.
    AllItems,
    /// Only new and updated items, in listing order.
    ChangedItems,
    /// The explicit sequence passed to [`ReadAheadCache::set_order`].
    SelectedItems,
}

/// Item sets maintained by the tracking layer above the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedItems {
    pub all: BTreeSet<String>,
    pub new: BTreeSet<String>,
    pub updated: BTreeSet<String>,
}

impl TrackedItems {
    pub fn is_changed(&self, luid: &str) -> bool {
        self.new.contains(luid) || self.updated.contains(luid)
    }
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Data(String),
    /// The item was requested but could not be read; replayed on lookup.
    Missing(String),
}

/// Running counters, logged after every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads requested by the caller.
    pub reads: usize,
    /// Items transferred from the server, in batches or one by one.
    pub from_server: usize,
    /// Requests sent to fetch items.
    pub queries: usize,
    /// Mispredicted reads.
    pub misses: usize,
}

impl CacheStats {
    pub fn miss_percentage(&self) -> usize {
        if self.reads == 0 {
            0
        } else {
            self.misses * 100 / self.reads
        }
    }
}

#[derive(Debug)]
pub struct ReadAheadCache {
    order: ReadAheadOrder,
    selected: Vec<String>,
    entries: Option<HashMap<String, CacheEntry>>,
    batch_size: usize,
    stats: CacheStats,
}

impl ReadAheadCache {
    pub fn new(batch_size: usize) -> Self {
        Self {
            order: ReadAheadOrder::None,
            selected: Vec::new(),
            entries: None,
            batch_size: batch_size.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Switch the prediction. Whatever was cached so far is dropped.
    pub fn set_order(&mut self, order: ReadAheadOrder, luids: Vec<String>) {
        debug!(?order, selected = luids.len(), "read-ahead order changed");
        self.order = order;
        self.selected = luids;
        self.entries = None;
    }

    pub fn order(&self) -> ReadAheadOrder {
        self.order
    }

    /// LUIDs given with [`ReadAheadOrder::SelectedItems`].
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Cached outcome for `luid`: the payload, or the failure recorded when
    /// the batch was read. `None` when nothing is cached for it.
    pub fn lookup(&self, luid: &str) -> Option<Result<String>> {
        let entry = self.entries.as_ref()?.get(luid)?;
        Some(match entry {
            CacheEntry::Data(data) => {
                debug!("reading {luid} from cache");
                Ok(data.clone())
            }
            CacheEntry::Missing(reason) => {
                debug!("reading {luid} into cache had failed: {reason}");
                Err(DavError::NotFound(reason.clone()))
            }
        })
    }

    /// Forget `luid` after it was written or removed.
    pub fn invalidate(&mut self, luid: &str) {
        if let Some(entries) = self.entries.as_mut() {
            entries.remove(luid);
        }
    }

    /// Drop all cached payloads, keeping the order.
    pub fn clear(&mut self) {
        self.entries = None;
    }

    pub fn count_read(&mut self) {
        self.stats.reads += 1;
    }

    /// Record a request that fetched `items` items.
    pub fn count_query(&mut self, items: usize) {
        self.stats.queries += 1;
        self.stats.from_server += items;
    }

    /// Items to fetch together, starting with `anchor`.
    ///
    /// Returns `None` when `anchor` is not where the prediction expected it.
    /// That counts as a miss and turns read-ahead off for good.
    pub fn plan_batch(&mut self, anchor: &str, tracked: &TrackedItems) -> Option<Vec<String>> {
        let mut batch = vec![anchor.to_string()];
        let predicted = match self.order {
            ReadAheadOrder::None => true,
            ReadAheadOrder::AllItems | ReadAheadOrder::ChangedItems => {
                let changed_only = self.order == ReadAheadOrder::ChangedItems;
                let wanted = |luid: &str| !changed_only || tracked.is_changed(luid);
                let predicted = tracked.all.contains(anchor) && wanted(anchor);
                let following = tracked
                    .all
                    .range::<str, _>((Bound::Excluded(anchor), Bound::Unbounded))
                    .filter(|luid| wanted(luid));
                for luid in following {
                    if batch.len() >= self.batch_size {
                        break;
                    }
                    batch.push(luid.clone());
                }
                predicted
            }
            ReadAheadOrder::SelectedItems => {
                match self.selected.iter().position(|luid| luid == anchor) {
                    Some(pos) => {
                        for luid in &self.selected[pos + 1..] {
                            if batch.len() >= self.batch_size {
                                break;
                            }
                            if !batch.contains(luid) {
                                batch.push(luid.clone());
                            }
                        }
                        true
                    }
                    None => false,
                }
            }
        };

        if !predicted {
            self.stats.misses += 1;
            debug!("reading {anchor}: disable read-ahead due to cache miss");
            self.order = ReadAheadOrder::None;
            self.entries = None;
            return None;
        }
        Some(batch)
    }

    /// Replace the cache with the outcome of one multi-get.
    ///
    /// `fetched` pairs a LUID with its payload, or `None` when the server
    /// reported the item without data. Every requested LUID ends up with an
    /// entry; items the server left out are recorded as not found.
    pub fn install(&mut self, requested: &[String], fetched: Vec<(String, Option<String>)>) {
        let mut pending: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let mut entries = HashMap::with_capacity(requested.len());

        for (luid, data) in fetched {
            if !pending.remove(luid.as_str()) {
                debug!("ignoring {luid} in multiget response, it was not requested");
                continue;
            }
            let entry = match data {
                Some(data) => CacheEntry::Data(data),
                None => CacheEntry::Missing(format!("{luid}: no data in multiget response")),
            };
            entries.insert(luid, entry);
        }
        for luid in pending {
            entries.insert(
                luid.to_string(),
                CacheEntry::Missing(format!("{luid}: not contained in multiget response")),
            );
        }

        self.entries = Some(entries);
    }

    pub fn log_stats(&self) {
        let stats = &self.stats;
        debug!(
            "requested {}, retrieved {} from server in {} queries, misses {}/{} ({}%)",
            stats.reads,
            stats.from_server,
            stats.queries,
            stats.misses,
            stats.reads,
            stats.miss_percentage()
        );
    }
}
