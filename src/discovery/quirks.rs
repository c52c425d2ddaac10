use crate::webdav::uri::DavUri;

/// A provider that serves the same collections under a current and a legacy
/// endpoint. Once the current endpoint produced a match, candidates under
/// the legacy one are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderQuirk {
    pub name: &'static str,
    /// Hosts, or parent domains, operated by the provider.
    pub host_suffixes: &'static [&'static str],
    pub preferred_prefix: &'static str,
    pub legacy_prefix: &'static str,
}

impl ProviderQuirk {
    fn serves(&self, uri: &DavUri) -> bool {
        self.host_suffixes.iter().any(|host| {
            uri.host == *host
                || uri
                    .host
                    .strip_suffix(host)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    pub fn skips(&self, candidate: &DavUri, matches: &[DavUri]) -> bool {
        self.serves(candidate)
            && candidate.path.starts_with(self.legacy_prefix)
            && matches
                .iter()
                .any(|m| self.serves(m) && m.path.starts_with(self.preferred_prefix))
    }
}

/// Built-in table.
pub fn default_quirks() -> Vec<ProviderQuirk> {
    vec![ProviderQuirk {
        name: "google",
        host_suffixes: &["google.com", "googleusercontent.com"],
        preferred_prefix: "/caldav/v2/",
        legacy_prefix: "/calendar/dav/",
    }]
}

/// First quirk that rules out `candidate`.
pub fn skipped_by<'q>(
    quirks: &'q [ProviderQuirk],
    candidate: &DavUri,
    matches: &[DavUri],
) -> Option<&'q ProviderQuirk> {
    quirks.iter().find(|q| q.skips(candidate, matches))
}
