use std::collections::{HashSet, VecDeque};

use crate::webdav::uri::DavUri;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Configured,
    WellKnown,
    Dns,
    Redirect,
    HomeSet,
    Principal,
    Parent,
    Member,
}

/// A place to probe during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub uri: DavUri,
    /// Also enumerate the members of this collection.
    pub list: bool,
    pub provenance: Provenance,
}

impl Candidate {
    pub fn new(uri: DavUri, list: bool, provenance: Provenance) -> Self {
        Self {
            uri,
            list,
            provenance,
        }
    }

    fn key(&self) -> (String, bool) {
        (self.uri.to_url(), self.list)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Probe next. Used for redirects, home-sets and principals.
    Front,
    /// Probe after everything already queued.
    Back,
}

/// Discovery frontier plus everything already probed.
///
/// A candidate (URI and listing flag) enters the queue at most once over the
/// whole search.
#[derive(Debug, Default)]
pub struct Tried {
    queue: VecDeque<Candidate>,
    seen: HashSet<(String, bool)>,
    found: bool,
}

impl Tried {
    /// Queue `candidate` unless it was queued or probed before. Returns
    /// whether it was added.
    pub fn add_candidate(&mut self, candidate: Candidate, position: Position) -> bool {
        if !self.seen.insert(candidate.key()) {
            return false;
        }
        match position {
            Position::Front => self.queue.push_front(candidate),
            Position::Back => self.queue.push_back(candidate),
        }
        true
    }

    /// Take the next candidate to probe.
    pub fn next_candidate(&mut self) -> Option<Candidate> {
        self.queue.pop_front()
    }

    pub fn found_result(&mut self) {
        self.found = true;
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// A failed probe aborts discovery only when it was the last option and
    /// nothing has matched so far.
    pub fn error_is_fatal(&self) -> bool {
        self.queue.is_empty() && !self.found
    }
}
