use fast_dav_sync::webdav::parse_multistatus;

const CALENDAR_HOME: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav" xmlns:CS="http://calendarserver.org/ns/">
  <D:response>
    <D:href>/calendars/alice/work/</D:href>
    <D:propstat>
      <D:prop>
        <D:displayname>Work &amp; Life</D:displayname>
        <D:resourcetype>
          <D:collection/>
          <C:calendar/>
        </D:resourcetype>
        <D:getetag>&quot;etag-1&quot;</D:getetag>
        <C:supported-calendar-component-set>
          <C:comp name="VEVENT"/>
          <C:comp name="VTODO"/>
        </C:supported-calendar-component-set>
        <D:current-user-privilege-set>
          <D:privilege><D:read/></D:privilege>
          <D:privilege><D:read-current-user-privilege-set/></D:privilege>
        </D:current-user-privilege-set>
        <C:calendar-home-set>
          <D:href>/calendars/alice/</D:href>
        </C:calendar-home-set>
        <D:current-user-principal>
          <D:href>/principals/alice/</D:href>
        </D:current-user-principal>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
    <D:propstat>
      <D:prop>
        <CS:getctag/>
        <D:displayname/>
      </D:prop>
      <D:status>HTTP/1.1 404 Not Found</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

#[test]
fn test_parse_collection_properties() {
    let resources = parse_multistatus(CALENDAR_HOME.as_bytes()).expect("valid multistatus");
    assert_eq!(resources.len(), 1);
    let res = &resources[0];
    assert_eq!(res.href, "/calendars/alice/work/");
    assert_eq!(res.status, None);

    let props = &res.props;
    assert_eq!(props.displayname.as_deref(), Some("Work & Life"));
    assert_eq!(props.etag.as_deref(), Some("\"etag-1\""));
    assert!(props.is_collection());
    assert!(props.has_type("calendar"));
    assert_eq!(props.supported_components, vec!["VEVENT", "VTODO"]);
    assert_eq!(props.calendar_home_set, vec!["/calendars/alice/"]);
    assert_eq!(props.current_user_principal, vec!["/principals/alice/"]);
    // only in the failed propstat
    assert_eq!(props.ctag, None);
}

#[test]
fn test_read_only_privileges() {
    let resources = parse_multistatus(CALENDAR_HOME.as_bytes()).expect("valid multistatus");
    let props = &resources[0].props;
    assert_eq!(
        props.privileges.as_deref(),
        Some(&["read".to_string(), "read-current-user-privilege-set".to_string()][..])
    );
    assert!(props.is_read_only());
}

#[test]
fn test_missing_privilege_set_is_writable() {
    let xml = r#"<?xml version="1.0"?>
<multistatus xmlns="DAV:">
  <response>
    <href>/a/</href>
    <propstat>
      <prop><resourcetype><collection/></resourcetype></prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>"#;
    let resources = parse_multistatus(xml.as_bytes()).expect("valid multistatus");
    assert_eq!(resources[0].props.privileges, None);
    assert!(!resources[0].props.is_read_only());
    assert!(resources[0].props.is_collection());
}

#[test]
fn test_write_privilege() {
    let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/a/</d:href>
    <d:propstat>
      <d:prop>
        <d:current-user-privilege-set>
          <d:privilege><d:read/></d:privilege>
          <d:privilege><d:write/></d:privilege>
        </d:current-user-privilege-set>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
    let resources = parse_multistatus(xml.as_bytes()).expect("valid multistatus");
    assert!(!resources[0].props.is_read_only());
}

#[test]
fn test_multiget_payloads_and_missing_members() {
    let xml = "<?xml version=\"1.0\" encoding=\"utf-8\"?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:carddav\">
  <D:response>
    <D:href>/ab/one.vcf</D:href>
    <D:propstat>
      <D:prop>
        <D:getetag>\"1\"</D:getetag>
        <C:address-data><![CDATA[BEGIN:VCARD\r\nUID:one\r\nEND:VCARD\r\n]]></C:address-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/ab/two.vcf</D:href>
    <D:status>HTTP/1.1 404 Not Found</D:status>
  </D:response>
</D:multistatus>";
    let resources = parse_multistatus(xml.as_bytes()).expect("valid multistatus");
    assert_eq!(resources.len(), 2);
    assert_eq!(
        resources[0].props.data.as_deref(),
        Some("BEGIN:VCARD\r\nUID:one\r\nEND:VCARD\r\n")
    );
    assert_eq!(resources[0].props.etag.as_deref(), Some("\"1\""));
    assert_eq!(resources[1].href, "/ab/two.vcf");
    assert_eq!(resources[1].status, Some(404));
    assert_eq!(resources[1].props.data, None);
}

#[test]
fn test_escaped_payload_text() {
    let xml = r#"<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:response>
    <D:href>/cal/e.ics</D:href>
    <D:propstat>
      <D:prop>
        <C:calendar-data>BEGIN:VCALENDAR&#13;
SUMMARY:a &lt;b&gt;&#13;
END:VCALENDAR&#13;
</C:calendar-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;
    let resources = parse_multistatus(xml.as_bytes()).expect("valid multistatus");
    assert_eq!(
        resources[0].props.data.as_deref(),
        Some("BEGIN:VCALENDAR\r\nSUMMARY:a <b>\r\nEND:VCALENDAR\r\n")
    );
}

#[test]
fn test_malformed_xml_is_an_error() {
    let xml = "<D:multistatus xmlns:D=\"DAV:\"><D:response></D:multistatus>";
    assert!(parse_multistatus(xml.as_bytes()).is_err());
}
