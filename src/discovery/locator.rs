use futures::future::BoxFuture;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use std::cmp::Reverse;
use tracing::debug;

use crate::error::{DavError, Result};

/// DNS-based service discovery (RFC 6764).
pub trait ServiceLocator: Send + Sync {
    /// Base URL of `service` (`caldav`, `carddav`) for `domain`.
    ///
    /// `Ok(None)` means the domain does not offer the service; errors are
    /// transient lookup failures worth retrying.
    fn locate<'a>(&'a self, service: &'a str, domain: &'a str)
    -> BoxFuture<'a, Result<Option<String>>>;
}

/// Looks up SRV and TXT records with the system resolver configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct SrvLocator;

fn is_missing(err: &ResolveError) -> bool {
    matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

fn lookup_error(name: &str, err: ResolveError) -> DavError {
    DavError::Transport(format!("DNS lookup of {name} failed: {err}"))
}

async fn txt_path(resolver: &TokioAsyncResolver, name: &str) -> Result<Option<String>> {
    let lookup = match resolver.txt_lookup(name).await {
        Ok(lookup) => lookup,
        Err(err) if is_missing(&err) => return Ok(None),
        Err(err) => return Err(lookup_error(name, err)),
    };
    for txt in lookup.iter() {
        for data in txt.txt_data() {
            let entry = String::from_utf8_lossy(data);
            if let Some(path) = entry.trim().strip_prefix("path=")
                && path.starts_with('/')
            {
                return Ok(Some(path.to_string()));
            }
        }
    }
    Ok(None)
}

impl ServiceLocator for SrvLocator {
    fn locate<'a>(
        &'a self,
        service: &'a str,
        domain: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let resolver = TokioAsyncResolver::tokio_from_system_conf()
                .map_err(|e| DavError::Transport(format!("DNS resolver unavailable: {e}")))?;

            for (scheme, name) in [
                ("https", format!("_{service}s._tcp.{domain}.")),
                ("http", format!("_{service}._tcp.{domain}.")),
            ] {
                let lookup = match resolver.srv_lookup(name.as_str()).await {
                    Ok(lookup) => lookup,
                    Err(err) if is_missing(&err) => continue,
                    Err(err) => return Err(lookup_error(&name, err)),
                };
                let Some(record) = lookup
                    .iter()
                    .min_by_key(|srv| (srv.priority(), Reverse(srv.weight())))
                else {
                    continue;
                };

                let target = record.target().to_utf8();
                let target = target.trim_end_matches('.');
                if target.is_empty() {
                    // "." target: service decidedly not available
                    return Ok(None);
                }
                let path = txt_path(&resolver, &name)
                    .await?
                    .unwrap_or_else(|| format!("/.well-known/{service}"));
                let default_port = if scheme == "https" { 443 } else { 80 };
                let url = if record.port() == default_port {
                    format!("{scheme}://{target}{path}")
                } else {
                    format!("{scheme}://{target}:{}{path}", record.port())
                };
                debug!(%name, %url, "service located via DNS");
                return Ok(Some(url));
            }
            Ok(None)
        })
    }
}
