use fast_dav_sync::ContentKind;
use fast_dav_sync::webdav::xml::{
    build_discovery_body, build_multiget_body, build_uid_query_body, escape_xml,
};

#[test]
fn test_escape_xml() {
    assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
}

#[test]
fn test_discovery_bodies_do_not_mix_protocols() {
    let card = build_discovery_body(ContentKind::Card);
    assert!(card.contains("addressbook-home-set"));
    assert!(!card.contains("calendar-home-set"));
    assert!(card.contains("current-user-privilege-set"));

    let cal = build_discovery_body(ContentKind::Event);
    assert!(cal.contains("calendar-home-set"));
    assert!(!cal.contains("addressbook-home-set"));
}

#[test]
fn test_multiget_body() {
    assert!(build_multiget_body(ContentKind::Card, Vec::<String>::new()).is_none());

    let body = build_multiget_body(ContentKind::Card, ["/ab/a.vcf", "/ab/b&c.vcf"])
        .expect("hrefs given");
    assert!(body.contains("<C:addressbook-multiget"));
    assert!(body.contains("urn:ietf:params:xml:ns:carddav"));
    assert!(body.contains("<C:address-data/>"));
    assert!(body.contains("<D:href>/ab/a.vcf</D:href>"));
    assert!(body.contains("<D:href>/ab/b&amp;c.vcf</D:href>"));

    let body = build_multiget_body(ContentKind::Event, ["/cal/e.ics"]).expect("hrefs given");
    assert!(body.contains("<C:calendar-multiget"));
    assert!(body.contains("<C:calendar-data/>"));
}

#[test]
fn test_uid_query_body() {
    let card = build_uid_query_body(ContentKind::Card, "a<b");
    assert!(card.contains("addressbook-query"));
    assert!(card.contains("<C:prop-filter name=\"UID\">"));
    assert!(card.contains("a&lt;b"));

    let todo = build_uid_query_body(ContentKind::Todo, "x");
    assert!(todo.contains("calendar-query"));
    assert!(todo.contains("<C:comp-filter name=\"VTODO\">"));
}
