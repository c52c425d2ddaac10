//! Collection discovery.
//!
//! Discovery is a graph search over PROPFIND replies. It starts at the
//! configured URLs (or at a DNS-derived URL), follows redirects, home-set
//! and principal properties, and lists collections until the accept
//! callback has what it wants.

pub mod candidates;
pub mod locator;
pub mod quirks;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::common::http::HyperClient;
use crate::config::{DavSettings, UrlFlags};
use crate::content::ContentKind;
use crate::error::{DavError, Result};
use crate::webdav::multistatus::{DavProps, DavResource};
use crate::webdav::session::DavSession;
use crate::webdav::types::{DavOutcome, DavRequest, Depth};
use crate::webdav::uri::{DavUri, escape, href_path, normalize_path};
use crate::webdav::xml::build_discovery_body;

pub use candidates::{Candidate, Position, Provenance, Tried};
pub use locator::{ServiceLocator, SrvLocator};
pub use quirks::{ProviderQuirk, default_quirks};

/// Upper bound on probed candidates.
pub const MAX_ITERATIONS: usize = 1000;

/// Everything the search needs, borrowed from the owning source.
pub struct Discovery<'a> {
    pub kind: ContentKind,
    pub settings: &'a DavSettings,
    pub client: &'a HyperClient,
    pub locator: &'a dyn ServiceLocator,
    pub quirks: &'a [ProviderQuirk],
}

fn collection_uri(base: &DavUri, reference: &str) -> DavUri {
    let mut uri = base.resolve(reference);
    uri.path = normalize_path(&uri.path, true);
    uri.query.clear();
    uri
}

fn find_props<'r>(resources: &'r [DavResource], path: &str) -> Option<(String, &'r DavProps)> {
    let wanted = normalize_path(path, true);
    if let Some(res) = resources
        .iter()
        .find(|r| normalize_path(&href_path(&r.href), true) == wanted)
    {
        return Some((wanted, &res.props));
    }
    // Some servers describe a different path than the one asked for.
    let first = resources.first()?;
    let actual = normalize_path(&href_path(&first.href), true);
    debug!("use properties for '{actual}' instead of '{wanted}'");
    Some((actual, &first.props))
}

fn www_variant(host: &str) -> String {
    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => format!("www.{host}"),
    }
}

impl Discovery<'_> {
    /// Run the search.
    ///
    /// `accept(name, uri, read_only)` is called once per matching collection
    /// and returns whether to keep searching. Returns `Ok(false)` when the
    /// callback stopped the search, `Ok(true)` when the frontier ran dry.
    /// `slot` holds the session for the authority currently talked to and is
    /// replaced whenever a candidate lives elsewhere.
    pub async fn find_collections<F>(
        &self,
        slot: &mut Option<DavSession>,
        mut accept: F,
    ) -> Result<bool>
    where
        F: FnMut(&str, &DavUri, bool) -> bool,
    {
        let username = self.settings.username();
        let well_known = normalize_path(self.kind.well_known_path(), true);
        let body = build_discovery_body(self.kind);

        let mut tried = Tried::default();
        let mut matches: Vec<DavUri> = Vec::new();
        let mut home_set_seen = false;
        let mut dns_tried = false;

        let mut seeds = Vec::new();
        for url in &self.settings.sync_urls {
            let (url, _) = UrlFlags::split(url)?;
            if url.trim().is_empty() {
                continue;
            }
            let uri = DavUri::parse(&url, true)?;
            if uri.host.is_empty() {
                warn!("ignoring sync URL without host: {url}");
                continue;
            }
            seeds.push(uri);
        }
        if seeds.is_empty() {
            seeds.push(self.locate_by_username().await?);
            dns_tried = true;
        }
        for uri in seeds {
            let is_root = uri.path == "/";
            if is_root {
                debug!("adding well-known path as fallback for {uri}");
            }
            let fallback = uri.with_path(&well_known);
            tried.add_candidate(
                Candidate::new(uri, false, Provenance::Configured),
                Position::Back,
            );
            if is_root {
                tried.add_candidate(
                    Candidate::new(fallback, false, Provenance::WellKnown),
                    Position::Back,
                );
            }
        }

        let mut iterations = 0usize;
        while let Some(candidate) = tried.next_candidate() {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                return Err(DavError::DiscoveryExhausted(format!(
                    "giving up search for collection after {MAX_ITERATIONS} attempts"
                )));
            }

            let mut uri = candidate.uri.clone();
            let username_inserted = uri.path.contains("%u");
            if username_inserted {
                uri.path = uri.path.replace("%u", &escape(username));
            }

            if let Some(quirk) = quirks::skipped_by(self.quirks, &uri, &matches) {
                debug!(provider = quirk.name, "skipping legacy endpoint {uri}");
                continue;
            }

            // Well-known URLs are only expected to redirect, but some servers
            // answer them directly. The root is queued as a last resort.
            let mut path = uri.path.clone();
            let is_well_known = path == well_known;
            if is_well_known {
                path.pop();
                tried.add_candidate(
                    Candidate::new(uri.with_path("/"), false, Provenance::Configured),
                    Position::Back,
                );
            }

            let session = self.session_for(slot, &uri)?;
            let deadline = session.deadline();
            debug!(%uri, list = candidate.list, provenance = ?candidate.provenance, "read relevant properties");

            let reply = match session
                .run("PROPFIND", deadline, |_| {
                    DavRequest::propfind(&path, Depth::Zero, body.clone())
                })
                .await
            {
                Ok(DavOutcome::Redirect { status, location }) => {
                    let next = collection_uri(&uri.with_path(&path), &location);
                    if tried.add_candidate(
                        Candidate::new(next.clone(), candidate.list, Provenance::Redirect),
                        Position::Front,
                    ) {
                        debug!(status, "new candidate from {path} -> {next} redirect");
                    } else {
                        debug!(status, "already known candidate from {path} -> {next} redirect");
                    }
                    continue;
                }
                Ok(DavOutcome::Response(response)) => response
                    .ensure_success("PROPFIND")
                    .and_then(|r| r.multistatus()),
                Err(err) => Err(err),
            };

            let resources = match reply {
                Ok(resources) => resources,
                Err(err) => {
                    if err.status() == Some(404)
                        && username_inserted
                        && path.contains(&escape(username))
                    {
                        return Err(DavError::Authentication(format!(
                            "Path not found: {path}. Is the username '{username}' correct?"
                        )));
                    }
                    if is_well_known && !dns_tried {
                        dns_tried = true;
                        self.enqueue_dns_candidates(&mut tried, &uri.host).await;
                    }
                    if tried.error_is_fatal() {
                        return Err(err);
                    }
                    debug!("ignore error for URI candidate {uri}: {err}");
                    continue;
                }
            };

            let Some((actual_path, props)) = find_props(&resources, &path) else {
                debug!("no properties returned for {uri}");
                continue;
            };
            let current = uri.with_path(&actual_path);

            let mut is_result = false;
            if self.kind.type_matches(props) {
                is_result = true;
                tried.found_result();
                matches.push(current.clone());
                let name = props.displayname.clone().unwrap_or_default();
                let read_only = props.is_read_only();
                debug!(%current, name = %name, read_only, "found collection");
                if !accept(&name, &current, read_only) {
                    return Ok(false);
                }
            }

            // Home-sets take priority over everything else.
            let home_sets = if self.kind.is_card() {
                &props.addressbook_home_set
            } else {
                &props.calendar_home_set
            };
            let mut followed_home = false;
            for href in home_sets.iter().rev() {
                home_set_seen = true;
                let home = collection_uri(&current, href);
                if tried.add_candidate(
                    Candidate::new(home.clone(), true, Provenance::HomeSet),
                    Position::Front,
                ) {
                    debug!("follow home-set property to {home}");
                    followed_home = true;
                }
            }
            if !followed_home {
                for href in &props.current_user_principal {
                    let principal = collection_uri(&current, href);
                    if tried.add_candidate(
                        Candidate::new(principal.clone(), false, Provenance::Principal),
                        Position::Front,
                    ) {
                        debug!("follow current-user-principal to {principal}");
                    }
                }
            }
            if home_sets.is_empty()
                && props.current_user_principal.is_empty()
                && is_result
                && !home_set_seen
            {
                let mut parent = current.parent();
                while let Some(dir) = parent {
                    parent = dir.parent();
                    tried.add_candidate(
                        Candidate::new(dir, false, Provenance::Parent),
                        Position::Back,
                    );
                }
            }

            let is_leaf = ContentKind::is_leaf_collection(props);
            if candidate.list && props.is_collection() && !(is_result && is_leaf) {
                let session = self.session_for(slot, &current)?;
                let listing = session
                    .execute("PROPFIND", deadline, |_| {
                        DavRequest::propfind(&actual_path, Depth::One, body.clone())
                    })
                    .await
                    .and_then(|r| r.ensure_success("PROPFIND"))
                    .and_then(|r| r.multistatus());
                match listing {
                    Ok(members) => {
                        let mut next: Vec<DavUri> = members
                            .iter()
                            .filter(|m| self.worth_probing(&m.props))
                            .map(|m| collection_uri(&current, &m.href))
                            .filter(|m| m.path != actual_path)
                            .collect();
                        next.sort_by(|a, b| a.path.cmp(&b.path));
                        for member in next {
                            if tried.add_candidate(
                                Candidate::new(member.clone(), true, Provenance::Member),
                                Position::Back,
                            ) {
                                debug!("new candidate from listing {actual_path}: {member}");
                            }
                        }
                    }
                    Err(err) => {
                        if tried.error_is_fatal() {
                            return Err(err);
                        }
                        debug!("ignore error listing {current}: {err}");
                    }
                }
            }
        }

        Ok(true)
    }

    fn worth_probing(&self, props: &DavProps) -> bool {
        props.is_collection()
            && !props.has_type("schedule-inbox")
            && !props.has_type("schedule-outbox")
            && !props.has_type("shared")
            && (self.kind.type_matches(props) || !ContentKind::is_leaf_collection(props))
    }

    /// Session for the authority of `uri`, reopened when it changed.
    fn session_for<'s>(
        &self,
        slot: &'s mut Option<DavSession>,
        uri: &DavUri,
    ) -> Result<&'s mut DavSession> {
        match slot.as_ref().map(|s| s.uri().same_authority(uri)) {
            Some(true) => {}
            Some(false) => {
                debug!("switching session to {}", uri.with_path("/"));
                let next = slot.as_ref().map(|s| s.reopen(uri.with_path("/")));
                *slot = next;
            }
            None => {
                *slot = Some(DavSession::new(
                    self.client.clone(),
                    uri.with_path("/"),
                    self.settings,
                )?);
            }
        }
        slot.as_mut()
            .ok_or_else(|| DavError::Transport("no session available".to_string()))
    }

    /// Find the service through DNS, keyed by the username's domain.
    /// Transient lookup failures are retried until the retry budget is used up.
    async fn locate_by_username(&self) -> Result<DavUri> {
        let username = self.settings.username();
        let Some(domain) = username
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
        else {
            return Err(DavError::Authentication(format!(
                "syncURL not configured and username {username} does not contain a domain"
            )));
        };

        let service = self.kind.service();
        let budget_end = Instant::now().checked_add(self.settings.retry_duration());
        let mut delay = self.settings.resend_interval();
        loop {
            match self.locator.locate(service, domain).await {
                Ok(Some(url)) => {
                    debug!("found {service} service for {domain}: {url}");
                    return DavUri::parse(&url, true);
                }
                Ok(None) => {
                    return Err(DavError::DiscoveryExhausted(format!(
                        "no {service} service found for domain {domain}"
                    )));
                }
                Err(err) => {
                    let in_budget = match (Instant::now().checked_add(delay), budget_end) {
                        (Some(resend_at), Some(end)) => resend_at <= end,
                        _ => false,
                    };
                    if delay.is_zero() || !in_budget {
                        return Err(err);
                    }
                    debug!("DNS lookup for {domain} failed, retrying: {err}");
                    sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }

    /// DNS fallback after a failed well-known probe. Failures are absorbed.
    async fn enqueue_dns_candidates(&self, tried: &mut Tried, host: &str) {
        let service = self.kind.service();
        for domain in [host.to_string(), www_variant(host)] {
            match self.locator.locate(service, &domain).await {
                Ok(Some(url)) => match DavUri::parse(&url, true) {
                    Ok(uri) => {
                        if tried.add_candidate(
                            Candidate::new(uri.clone(), false, Provenance::Dns),
                            Position::Front,
                        ) {
                            debug!("new candidate from DNS lookup of {domain}: {uri}");
                        }
                    }
                    Err(err) => warn!("ignoring DNS result {url} for {domain}: {err}"),
                },
                Ok(None) => debug!("no {service} service advertised for {domain}"),
                Err(err) => debug!("DNS lookup for {domain} failed: {err}"),
            }
        }
    }
}
