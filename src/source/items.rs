use std::collections::BTreeSet;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::mapping::{etag_to_revision, luid_to_path, path_to_luid};
use super::{DavSource, RevisionMap, props_for};
use crate::error::{DavError, Result};
use crate::uid::{create_resource_name, extract_uid, set_resource_name};
use crate::webdav::multistatus::DavResource;
use crate::webdav::types::{DavRequest, DavResponse, Depth};
use crate::webdav::uri::{DavUri, href_path};
use crate::webdav::xml::{
    build_add_member_body, build_listing_body, build_typed_listing_body, build_uid_query_body,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertState {
    /// Stored as sent.
    Okay,
    /// An item with the same UID already exists under `luid`; the caller has
    /// to merge and update that one instead.
    NeedsMerge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertItemResult {
    pub luid: String,
    /// Empty for [`InsertState::NeedsMerge`].
    pub revision: String,
    pub state: InsertState,
}

/// Revisions of the non-collection resources in a PROPFIND answer. The flag
/// reports resources that came without an ETag.
fn collect_revisions(collection: &DavUri, resources: &[DavResource]) -> (RevisionMap, bool) {
    let mut revisions = RevisionMap::new();
    let mut failed = false;
    for resource in resources {
        if resource.props.is_collection() {
            continue;
        }
        let path = href_path(&resource.href);
        let luid = path_to_luid(collection, &path);
        if luid.is_empty() {
            continue;
        }
        match &resource.props.etag {
            Some(etag) => {
                let revision = etag_to_revision(etag);
                debug!("item {luid} = rev {revision}");
                revisions.insert(luid, revision);
            }
            None => {
                failed = true;
                error!("{}: no ETag returned", collection.with_path(&path));
            }
        }
    }
    (revisions, failed)
}

/// LUID named by the `Location` header, if any.
fn location_luid(collection: &DavUri, response: &DavResponse) -> Option<String> {
    response
        .location()
        .filter(|location| !location.trim().is_empty())
        .map(|location| path_to_luid(collection, &href_path(location)))
}

fn is_success(status: Option<u16>) -> bool {
    status.is_none_or(|s| (200..300).contains(&s))
}

impl DavSource {
    /// Path to POST new items to, as advertised by `add-member`. Checked once
    /// per connection.
    pub async fn check_post_support(&mut self) -> Result<Option<String>> {
        if let Some(post_path) = &self.post_path {
            return Ok(post_path.clone());
        }

        let (session, collection) = self.connection()?;
        let deadline = session.deadline();
        debug!("check POST support of {}", collection.path);
        let resources = session
            .execute("PROPFIND", deadline, |_| {
                DavRequest::propfind(&collection.path, Depth::Zero, build_add_member_body())
            })
            .await?
            .ensure_success("PROPFIND")?
            .multistatus()?;
        let post_path = props_for(&resources, &collection.path)
            .and_then(|props| props.add_member.first())
            .map(|href| href_path(href));
        debug!(
            "{} POST support: {}",
            collection.path,
            post_path.as_deref().unwrap_or("<none>")
        );

        self.post_path = Some(post_path.clone());
        Ok(post_path)
    }

    /// LUID and revision of every item in the collection.
    pub async fn list_all_items(&mut self) -> Result<RevisionMap> {
        self.contact_server().await?;
        let kind = self.kind;
        let (session, collection) = self.connection()?;
        let deadline = session.deadline();

        if !kind.is_mixed() {
            let resources = session
                .execute("PROPFIND", deadline, |_| {
                    DavRequest::propfind(&collection.path, Depth::One, build_listing_body())
                })
                .await?
                .ensure_success("PROPFIND")?
                .multistatus()?;
            let (revisions, failed) = collect_revisions(collection, &resources);
            if failed {
                return Err(DavError::ProtocolInconsistency(
                    "incomplete listing of all items".to_string(),
                ));
            }
            return Ok(revisions);
        }

        // Calendars can hold several component types and some servers ignore
        // the comp-filter, so every payload is checked here as well.
        let resources = session
            .execute("REPORT", deadline, |_| {
                DavRequest::report(&collection.path, Depth::One, build_typed_listing_body(kind))
            })
            .await?
            .ensure_success("REPORT")?
            .multistatus()?;
        let marker = format!("\nBEGIN:{}", kind.component());
        let mut revisions = RevisionMap::new();
        for resource in &resources {
            let Some(data) = resource.props.data.as_deref().filter(|d| !d.is_empty()) else {
                continue;
            };
            if !data.contains(&marker) {
                continue;
            }
            let luid = path_to_luid(collection, &href_path(&resource.href));
            let revision = resource
                .props
                .etag
                .as_deref()
                .map(etag_to_revision)
                .unwrap_or_default();
            revisions.insert(luid, revision);
        }
        Ok(revisions)
    }

    /// LUID of the one item whose UID is `uid`.
    pub async fn find_by_uid(&mut self, uid: &str, deadline: Option<Instant>) -> Result<String> {
        let kind = self.kind;
        let (session, collection) = self.connection()?;
        let resources = session
            .execute("REPORT", deadline, |_| {
                DavRequest::report(&collection.path, Depth::One, build_uid_query_body(kind, uid))
            })
            .await?
            .ensure_success("REPORT")?
            .multistatus()?;

        let luids: BTreeSet<String> = resources
            .iter()
            .filter(|r| is_success(r.status) && !r.props.is_collection())
            .map(|r| path_to_luid(collection, &href_path(&r.href)))
            .collect();
        let mut luids = luids.into_iter();
        match (luids.next(), luids.next()) {
            (None, _) => Err(DavError::NotFound("object not found".to_string())),
            (Some(luid), None) => Ok(luid),
            (Some(_), Some(_)) => Err(DavError::ProtocolInconsistency(format!(
                "UID {uid} not unique?!"
            ))),
        }
    }

    /// Create (`luid` empty) or overwrite an item.
    pub async fn insert_item(&mut self, luid: &str, item: &str) -> Result<InsertItemResult> {
        self.readahead.invalidate(luid);
        self.contact_server().await?;
        let result = if luid.is_empty() {
            self.create_item(item).await?
        } else {
            self.update_item(luid, item).await?
        };
        // A create only learns its LUID from the server.
        self.readahead.invalidate(&result.luid);
        Ok(result)
    }

    async fn create_item(&mut self, item: &str) -> Result<InsertItemResult> {
        let kind = self.kind;
        let post_path = self.check_post_support().await?;
        let operation = if post_path.is_some() { "POST" } else { "PUT" };
        let (mut new_luid, payload) = create_resource_name(kind, item);

        let (session, collection) = self.connection()?;
        let deadline = session.deadline();
        let target = match &post_path {
            Some(path) => path.clone(),
            None => luid_to_path(collection, &new_luid),
        };
        // The precondition only guards the first attempt: a resend may find
        // the item created by an attempt whose answer got lost.
        let response = session
            .execute(operation, deadline, |attempt| {
                if post_path.is_some() {
                    DavRequest::post(&target, kind.content_type(), &payload)
                } else if attempt == 1 {
                    DavRequest::put(&target, kind.content_type(), &payload)
                        .with_header("If-None-Match", "*")
                } else {
                    DavRequest::put(&target, kind.content_type(), &payload)
                }
            })
            .await?;
        let status = response.status.as_u16();
        debug!(status, "add item status");

        match status {
            200..=299 => {}
            412 => {
                let uid = extract_uid(&payload).map(|uid| uid.value).unwrap_or_default();
                let luid = self.find_by_uid(&uid, deadline).await?;
                return Ok(InsertItemResult {
                    luid,
                    revision: String::new(),
                    state: InsertState::NeedsMerge,
                });
            }
            403 if post_path.is_some() => {
                // Some servers reject a POST with an existing UID this way.
                if let Some(uid) = extract_uid(item).filter(|uid| !uid.value.is_empty()) {
                    match self.find_by_uid(&uid.value, deadline).await {
                        Ok(luid) => {
                            return Ok(InsertItemResult {
                                luid,
                                revision: String::new(),
                                state: InsertState::NeedsMerge,
                            });
                        }
                        Err(err) => warn!("looking up UID {} after 403 failed: {err}", uid.value),
                    }
                }
                return Err(DavError::from_status(operation, status));
            }
            _ => return Err(DavError::from_status(operation, status)),
        }

        let revision = response.etag().map(etag_to_revision).unwrap_or_default();
        if let Some(real_luid) = location_luid(collection, &response) {
            debug!("new item mapped to {real_luid}");
            new_luid = real_luid;
        } else if !revision.is_empty() {
            // Without a Location the server may still have merged the item
            // into an existing one; asking for the written path reveals that.
            let path = luid_to_path(collection, &new_luid);
            let resources = session
                .execute("PROPFIND", deadline, |_| {
                    DavRequest::propfind(&path, Depth::Zero, build_listing_body())
                })
                .await?
                .ensure_success("PROPFIND")?
                .multistatus()?;
            let (revisions, _) = collect_revisions(collection, &resources);
            if revisions.len() == 1
                && let Some(actual) = revisions.keys().next()
                && *actual != new_luid
            {
                debug!("{new_luid} mapped to {actual} by peer");
                new_luid = actual.clone();
            }
        }

        self.finish_insert(new_luid, revision, deadline).await
    }

    async fn update_item(&mut self, luid: &str, item: &str) -> Result<InsertItemResult> {
        let kind = self.kind;
        let payload = set_resource_name(kind, item, luid);
        let (session, collection) = self.connection()?;
        let deadline = session.deadline();
        let path = luid_to_path(collection, luid);
        let response = session
            .execute("PUT", deadline, |_| {
                DavRequest::put(&path, kind.content_type(), &payload)
            })
            .await?;
        let status = response.status.as_u16();
        debug!(status, "update item status");
        if !response.status.is_success() {
            return Err(DavError::from_status("PUT", status));
        }

        let revision = response.etag().map(etag_to_revision).unwrap_or_default();
        if let Some(real_luid) = location_luid(collection, &response)
            && real_luid != luid
        {
            return Err(DavError::ProtocolInconsistency(format!(
                "updating item: real luid {real_luid} does not match old luid {luid}"
            )));
        }

        self.finish_insert(luid.to_string(), revision, deadline).await
    }

    /// Ask for the ETag when the write did not return one.
    async fn finish_insert(
        &mut self,
        luid: String,
        revision: String,
        deadline: Option<Instant>,
    ) -> Result<InsertItemResult> {
        if !revision.is_empty() {
            return Ok(InsertItemResult {
                luid,
                revision,
                state: InsertState::Okay,
            });
        }

        let (session, collection) = self.connection()?;
        let path = luid_to_path(collection, &luid);
        let resources = session
            .execute("PROPFIND", deadline, |_| {
                DavRequest::propfind(&path, Depth::Zero, build_listing_body())
            })
            .await?
            .ensure_success("PROPFIND")?
            .multistatus()?;
        let (mut revisions, failed) = collect_revisions(collection, &resources);
        let revision = revisions.remove(&luid).unwrap_or_default();
        if failed || revision.is_empty() {
            return Err(DavError::ProtocolInconsistency(
                "could not retrieve ETag".to_string(),
            ));
        }
        Ok(InsertItemResult {
            luid,
            revision,
            state: InsertState::Okay,
        })
    }

    /// Fetch one item with a plain GET.
    pub(crate) async fn fetch_item(&mut self, luid: &str) -> Result<String> {
        let kind = self.kind;
        let (session, collection) = self.connection()?;
        let deadline = session.deadline();
        let path = luid_to_path(collection, luid);
        let response = session
            .execute("GET", deadline, |_| DavRequest::get(&path, kind.content_type()))
            .await?;
        match response.status.as_u16() {
            200..=299 => Ok(String::from_utf8_lossy(&response.body).into_owned()),
            // reported by some servers instead of 404
            410 => Err(DavError::NotFound(
                "object not found (was 410 'Gone')".to_string(),
            )),
            status => Err(DavError::from_status("GET", status)),
        }
    }

    pub async fn remove_item(&mut self, luid: &str) -> Result<()> {
        self.readahead.invalidate(luid);
        self.contact_server().await?;

        let (session, collection) = self.connection()?;
        let deadline = session.deadline();
        let path = luid_to_path(collection, luid);
        let response = session
            .execute("DELETE", deadline, |_| DavRequest::delete(&path))
            .await?;
        let status = response.status.as_u16();
        debug!(status, "remove item status");
        match status {
            200..=299 => Ok(()),
            412 => Err(DavError::NotFound(
                "object not found (was 412 'Precondition Failed')".to_string(),
            )),
            _ => Err(DavError::from_status("DELETE", status)),
        }
    }
}
