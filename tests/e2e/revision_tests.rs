use fast_dav_sync::{ContentKind, DavError, DavSettings, DavSource};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::util::{collection_settings, multistatus, response, source};

#[tokio::test]
async fn test_database_revision_reads_ctag() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/ab/"))
        .and(header("Depth", "0"))
        .and(body_string_contains("getctag"))
        .respond_with(multistatus(&response(
            "/ab/",
            "<CS:getctag>ctag-7</CS:getctag>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut source = source(ContentKind::Card, collection_settings(&server));
    assert_eq!(
        source.database_revision().await.expect("ctag readable"),
        "ctag-7"
    );
}

#[tokio::test]
async fn test_database_revision_without_ctag_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/ab/"))
        .respond_with(multistatus(&response("/ab/", "<D:resourcetype/>")))
        .mount(&server)
        .await;

    let mut source = source(ContentKind::Card, collection_settings(&server));
    assert_eq!(source.database_revision().await.expect("no ctag"), "");
}

#[tokio::test]
async fn test_no_ctag_flag_skips_request() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let settings = DavSettings {
        sync_urls: vec![format!("{}/?SyncFlags=NoCTag", server.uri())],
        ..collection_settings(&server)
    };
    let mut source = source(ContentKind::Card, settings);
    assert!(source.flags().no_ctag);
    assert_eq!(source.database_revision().await.expect("flag set"), "");
}

#[tokio::test]
async fn test_empty_collection() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/ab/"))
        .and(header("Depth", "1"))
        .respond_with(multistatus(&response(
            "/ab/",
            "<D:resourcetype><D:collection/><C:addressbook/></D:resourcetype>",
        )))
        .mount(&server)
        .await;

    let mut source = source(ContentKind::Card, collection_settings(&server));
    assert!(source.is_empty().await.expect("listing succeeds"));
}

#[tokio::test]
async fn test_configured_database_expands_username() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/dav/alice/cal/"))
        .respond_with(multistatus(&response(
            "/dav/alice/cal/",
            "<CS:getctag>42</CS:getctag>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let settings = DavSettings {
        database_id: format!("{}/dav/%u/cal/", server.uri()),
        ..collection_settings(&server)
    };
    let mut source = source(ContentKind::Event, settings);
    assert_eq!(source.database_revision().await.expect("ctag"), "42");
    assert_eq!(
        source.collection().map(|c| c.path.as_str()),
        Some("/dav/alice/cal/")
    );
}

#[tokio::test]
async fn test_server_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/ab/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut source = source(ContentKind::Card, collection_settings(&server));
    let err = source.database_revision().await.expect_err("401");
    assert!(matches!(err, DavError::Authentication(_)));
}

#[test]
fn test_open_rejects_proxy_and_unknown_flags() {
    let with_proxy = DavSettings {
        proxy: Some("http://proxy:3128".to_string()),
        ..DavSettings::default()
    };
    let mut source = DavSource::new(ContentKind::Card, with_proxy).expect("client builds");
    assert!(matches!(source.open(), Err(DavError::Configuration(_))));

    let bad_flag = DavSettings {
        sync_urls: vec!["https://dav.example.com/?SyncFlags=Bogus".to_string()],
        ..DavSettings::default()
    };
    let mut source = DavSource::new(ContentKind::Card, bad_flag).expect("client builds");
    let err = source.open().expect_err("unknown flag");
    assert!(err.to_string().contains("unknown flag Bogus"));
}
