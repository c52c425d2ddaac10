//! Request bodies for PROPFIND and REPORT.

use crate::content::ContentKind;

pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn propfind(namespaces: &str, props: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><D:propfind xmlns:D="DAV:"{namespaces}><D:prop>{props}</D:prop></D:propfind>"#
    )
}

/// Properties read from every discovery candidate. CalDAV and CardDAV
/// properties are never mixed, so a server broken for one protocol does not
/// break the other.
pub fn build_discovery_body(kind: ContentKind) -> String {
    const COMMON: &str = "<D:alternate-URI-set/><D:principal-URL/><D:current-user-principal/>\
        <D:group-member-set/><D:group-membership/><D:displayname/><D:resourcetype/>\
        <D:current-user-privilege-set/>";
    if kind.is_card() {
        propfind(
            r#" xmlns:C="urn:ietf:params:xml:ns:carddav""#,
            &format!(
                "{COMMON}<C:addressbook-home-set/><C:principal-address/>\
                 <C:addressbook-description/><C:supported-address-data/><C:max-resource-size/>"
            ),
        )
    } else {
        propfind(
            r#" xmlns:C="urn:ietf:params:xml:ns:caldav""#,
            &format!(
                "{COMMON}<C:calendar-home-set/><C:calendar-description/><C:calendar-timezone/>\
                 <C:supported-calendar-component-set/><C:supported-calendar-data/>\
                 <C:max-resource-size/><C:min-date-time/><C:max-date-time/>\
                 <C:max-instances/><C:max-attendees-per-instance/>"
            ),
        )
    }
}

/// ETag and type of each member, for listing homogeneous collections.
pub fn build_listing_body() -> String {
    propfind("", "<D:getetag/><D:resourcetype/>")
}

pub fn build_add_member_body() -> String {
    propfind("", "<D:add-member/>")
}

pub fn build_ctag_body() -> String {
    propfind(
        r#" xmlns:CS="http://calendarserver.org/ns/""#,
        "<CS:getctag/>",
    )
}

/// calendar-query returning only the UID of items of one component type.
pub fn build_typed_listing_body(kind: ContentKind) -> String {
    let component = kind.component();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav"><D:prop><D:getetag/><C:calendar-data><C:comp name="VCALENDAR"><C:prop name="VERSION"/><C:comp name="{component}"><C:prop name="UID"/></C:comp></C:comp></C:calendar-data></D:prop><C:filter><C:comp-filter name="VCALENDAR"><C:comp-filter name="{component}"/></C:comp-filter></C:filter></C:calendar-query>"#
    )
}

/// Query matching items whose UID equals `uid` exactly.
pub fn build_uid_query_body(kind: ContentKind, uid: &str) -> String {
    let uid = escape_xml(uid);
    if kind.is_card() {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><C:addressbook-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav"><D:prop><D:getetag/></D:prop><C:filter><C:prop-filter name="UID"><C:text-match collation="i;octet" match-type="equals">{uid}</C:text-match></C:prop-filter></C:filter></C:addressbook-query>"#
        )
    } else {
        let component = kind.component();
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav"><D:prop><D:getetag/></D:prop><C:filter><C:comp-filter name="VCALENDAR"><C:comp-filter name="{component}"><C:prop-filter name="UID"><C:text-match collation="i;octet">{uid}</C:text-match></C:prop-filter></C:comp-filter></C:comp-filter></C:filter></C:calendar-query>"#
        )
    }
}

/// Multi-get REPORT for the given resource paths. Returns `None` when there
/// is nothing to ask for.
pub fn build_multiget_body<I, S>(kind: ContentKind, hrefs: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut href_xml = String::new();
    for href in hrefs {
        let href = href.as_ref();
        if href.is_empty() {
            continue;
        }
        href_xml.push_str("<D:href>");
        href_xml.push_str(&escape_xml(href));
        href_xml.push_str("</D:href>");
    }
    if href_xml.is_empty() {
        return None;
    }

    let report = if kind.is_card() {
        "addressbook-multiget"
    } else {
        "calendar-multiget"
    };
    Some(format!(
        r#"<?xml version="1.0" encoding="utf-8"?><C:{report} xmlns:D="DAV:" xmlns:C="{ns}"><D:prop><D:getetag/><C:{data}/></D:prop>{href_xml}</C:{report}>"#,
        ns = kind.namespace(),
        data = kind.data_element(),
    ))
}
