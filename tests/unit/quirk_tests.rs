use fast_dav_sync::discovery::quirks::{default_quirks, skipped_by};
use fast_dav_sync::webdav::DavUri;

fn uri(url: &str) -> DavUri {
    DavUri::parse(url, true).expect("valid URL")
}

#[test]
fn test_google_legacy_endpoint_skipped_after_match() {
    let quirks = default_quirks();
    let legacy = uri("https://www.google.com/calendar/dav/alice@gmail.com/events/");
    let preferred = uri("https://apidata.googleusercontent.com/caldav/v2/alice@gmail.com/events/");

    assert!(skipped_by(&quirks, &legacy, &[]).is_none());
    let quirk = skipped_by(&quirks, &legacy, &[preferred]).expect("legacy skipped");
    assert_eq!(quirk.name, "google");
}

#[test]
fn test_other_hosts_unaffected() {
    let quirks = default_quirks();
    let candidate = uri("https://notgoogle.com/calendar/dav/x/");
    let matched = uri("https://www.google.com/caldav/v2/x/");
    assert!(skipped_by(&quirks, &candidate, &[matched]).is_none());
}
