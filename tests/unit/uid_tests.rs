use fast_dav_sync::ContentKind;
use fast_dav_sync::uid::{create_resource_name, extract_uid, set_resource_name};
use std::borrow::Cow;

const CARD_WITH_UID: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:1234-abcd\r\nFN:Jane Doe\r\nEND:VCARD\r\n";
const CARD_WITHOUT_UID: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jane Doe\r\nEND:VCARD\r\n";
const EVENT_WITHOUT_UID: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nSUMMARY:standup\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

#[test]
fn test_extract_uid() {
    let uid = extract_uid(CARD_WITH_UID).expect("UID present");
    assert_eq!(uid.value, "1234-abcd");
    assert_eq!(&CARD_WITH_UID[uid.span.clone()], "1234-abcd");
}

#[test]
fn test_extract_uid_unfolds_continuation_lines() {
    let item = "BEGIN:VCARD\nUID:abc\n def\nFN:x\nEND:VCARD\n";
    let uid = extract_uid(item).expect("UID present");
    assert_eq!(uid.value, "abcdef");
}

#[test]
fn test_extract_uid_missing() {
    assert!(extract_uid(CARD_WITHOUT_UID).is_none());
    // property must start a line
    assert!(extract_uid("BEGIN:VCARD\r\nX-UID:foo\r\nEND:VCARD\r\n").is_none());
}

#[test]
fn test_create_resource_name_uses_existing_uid() {
    let (name, payload) = create_resource_name(ContentKind::Card, CARD_WITH_UID);
    assert_eq!(name, "1234-abcd.vcf");
    assert!(matches!(payload, Cow::Borrowed(_)));
}

#[test]
fn test_create_resource_name_generates_uid() {
    let (name, payload) = create_resource_name(ContentKind::Card, CARD_WITHOUT_UID);
    let stem = name.strip_suffix(".vcf").expect("vCard suffix");
    assert_eq!(stem.len(), 36, "expected a UUID, got {stem}");
    assert!(payload.contains(&format!("\r\nUID:{stem}\r\nEND:VCARD")));
    assert_eq!(extract_uid(&payload).expect("UID inserted").value, stem);
}

#[test]
fn test_create_resource_name_ignores_uid_with_path_separator() {
    let item = "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:../x\r\nFN:x\r\nEND:VCARD\r\n";
    let (name, payload) = create_resource_name(ContentKind::Card, item);
    assert!(!name.contains('/'), "name {name} leaves the collection");
    assert_eq!(name.strip_suffix(".vcf").expect("vCard suffix").len(), 36);
    // the payload still carries its own UID
    assert!(matches!(payload, Cow::Borrowed(_)));
    assert_eq!(extract_uid(&payload).expect("UID kept").value, "../x");
}

#[test]
fn test_create_resource_name_for_events_uses_ics_suffix() {
    let (name, payload) = create_resource_name(ContentKind::Event, EVENT_WITHOUT_UID);
    assert!(name.ends_with(".ics"));
    let uid = extract_uid(&payload).expect("UID inserted");
    // inside the event, not after the calendar
    let uid_pos = uid.span.start;
    let end_event = payload.find("END:VEVENT").expect("event end");
    assert!(uid_pos < end_event);
}

#[test]
fn test_set_resource_name_keeps_existing_uid() {
    let payload = set_resource_name(ContentKind::Card, CARD_WITH_UID, "other.vcf");
    assert!(matches!(payload, Cow::Borrowed(_)));
}

#[test]
fn test_set_resource_name_inserts_missing_uid() {
    let payload = set_resource_name(ContentKind::Card, CARD_WITHOUT_UID, "foo.vcf");
    assert!(payload.contains("UID:foo\r\nEND:VCARD"));
}

#[test]
fn test_set_resource_name_fills_empty_uid() {
    let item = "BEGIN:VCARD\r\nUID:\r\nFN:x\r\nEND:VCARD\r\n";
    let payload = set_resource_name(ContentKind::Card, item, "bar.vcf");
    assert_eq!(payload, "BEGIN:VCARD\r\nUID:bar\r\nFN:x\r\nEND:VCARD\r\n");
}
