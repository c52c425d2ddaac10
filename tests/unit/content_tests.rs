use fast_dav_sync::ContentKind;
use fast_dav_sync::webdav::DavProps;

fn props(types: &[&str], components: &[&str]) -> DavProps {
    DavProps {
        resource_types: types.iter().map(|s| s.to_string()).collect(),
        supported_components: components.iter().map(|s| s.to_string()).collect(),
        ..DavProps::default()
    }
}

#[test]
fn test_kind_properties() {
    assert_eq!(ContentKind::Card.suffix(), ".vcf");
    assert_eq!(ContentKind::Todo.suffix(), ".ics");
    assert_eq!(ContentKind::Journal.component(), "VJOURNAL");
    assert_eq!(ContentKind::Card.well_known_path(), "/.well-known/carddav");
    assert_eq!(ContentKind::Event.service(), "caldav");
    assert!(ContentKind::Event.is_mixed());
    assert!(!ContentKind::Card.is_mixed());
    assert!(ContentKind::Card.content_type().starts_with("text/vcard"));
}

#[test]
fn test_type_matches() {
    let address_book = props(&["collection", "addressbook"], &[]);
    let calendar = props(&["collection", "calendar"], &[]);
    let tasks = props(&["collection", "calendar"], &["VTODO"]);

    assert!(ContentKind::Card.type_matches(&address_book));
    assert!(!ContentKind::Card.type_matches(&calendar));

    // no component set means everything is allowed
    assert!(ContentKind::Event.type_matches(&calendar));
    assert!(ContentKind::Todo.type_matches(&tasks));
    assert!(!ContentKind::Event.type_matches(&tasks));
}

#[test]
fn test_leaf_collections() {
    assert!(ContentKind::is_leaf_collection(&props(&["collection", "calendar"], &[])));
    assert!(!ContentKind::is_leaf_collection(&props(&["collection"], &[])));
}
