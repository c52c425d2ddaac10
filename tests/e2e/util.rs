use fast_dav_sync::{ContentKind, DavSettings, DavSource, ServiceLocator};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use wiremock::{MockServer, ResponseTemplate};

/// Locator for tests: no domain advertises anything.
pub struct NoDns;

impl ServiceLocator for NoDns {
    fn locate<'a>(
        &'a self,
        _service: &'a str,
        _domain: &'a str,
    ) -> BoxFuture<'a, fast_dav_sync::Result<Option<String>>> {
        Box::pin(async { Ok(None) })
    }
}

/// Locator that advertises `url` for one domain and records every lookup
/// as `service:domain`.
pub struct FixedDns {
    pub domain: String,
    pub url: String,
    pub lookups: Arc<Mutex<Vec<String>>>,
}

impl ServiceLocator for FixedDns {
    fn locate<'a>(
        &'a self,
        service: &'a str,
        domain: &'a str,
    ) -> BoxFuture<'a, fast_dav_sync::Result<Option<String>>> {
        Box::pin(async move {
            self.lookups
                .lock()
                .expect("lookup log poisoned")
                .push(format!("{service}:{domain}"));
            Ok((domain == self.domain).then(|| self.url.clone()))
        })
    }
}

pub const COLLECTION: &str = "/ab/";

pub const CARD_WITHOUT_UID: &str =
    "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jane Doe\r\nEND:VCARD\r\n";

pub fn card(uid: &str) -> String {
    format!("BEGIN:VCARD\r\nVERSION:3.0\r\nUID:{uid}\r\nFN:{uid}\r\nEND:VCARD\r\n")
}

/// Credentials and a base URL, resending disabled.
pub fn scan_settings(server: &MockServer, path: &str) -> DavSettings {
    DavSettings {
        sync_urls: vec![format!("{}{path}", server.uri())],
        username: Some("alice".to_string()),
        password: Some("secret".to_string()),
        retry_duration_secs: 0,
        ..DavSettings::default()
    }
}

/// Settings with the collection already selected.
pub fn collection_settings(server: &MockServer) -> DavSettings {
    DavSettings {
        database_id: format!("{}{COLLECTION}", server.uri()),
        ..scan_settings(server, "/")
    }
}

pub fn source(kind: ContentKind, settings: DavSettings) -> DavSource {
    let mut source = DavSource::new(kind, settings)
        .expect("Failed to create source")
        .with_locator(Box::new(NoDns));
    source.open().expect("Failed to open source");
    source
}

pub fn multistatus(responses: &str) -> ResponseTemplate {
    ResponseTemplate::new(207).set_body_raw(
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav" xmlns:CAL="urn:ietf:params:xml:ns:caldav" xmlns:CS="http://calendarserver.org/ns/">
{responses}
</D:multistatus>"#
        ),
        "application/xml; charset=utf-8",
    )
}

pub fn response(href: &str, props: &str) -> String {
    format!(
        r#"<D:response>
  <D:href>{href}</D:href>
  <D:propstat>
    <D:prop>{props}</D:prop>
    <D:status>HTTP/1.1 200 OK</D:status>
  </D:propstat>
</D:response>"#
    )
}

pub fn missing(href: &str) -> String {
    format!(
        r#"<D:response>
  <D:href>{href}</D:href>
  <D:status>HTTP/1.1 404 Not Found</D:status>
</D:response>"#
    )
}
