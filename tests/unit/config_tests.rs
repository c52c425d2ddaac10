use fast_dav_sync::{DavError, DavSettings, UrlFlags};
use std::time::Duration;

#[test]
fn test_defaults_from_empty_toml() {
    let settings = DavSettings::from_toml_str("").expect("empty config is valid");
    assert!(settings.sync_urls.is_empty());
    assert!(settings.verify_ssl_certificate);
    assert!(settings.verify_ssl_host);
    assert_eq!(settings.retry_duration(), Duration::from_secs(300));
    assert_eq!(settings.resend_interval(), Duration::from_secs(5));
    assert_eq!(settings.request_timeout(), Duration::from_secs(20));
    assert_eq!(settings.batch_size(), 50);
    assert!(!settings.has_credentials());
}

#[test]
fn test_full_toml() {
    let settings = DavSettings::from_toml_str(
        r#"
        sync_urls = ["https://dav.example.com/?SyncFlags=NoCTag"]
        database_id = "https://dav.example.com/cal/%u/"
        username = "alice"
        password = "secret"
        verify_ssl_host = false
        retry_duration_secs = 0
        read_ahead_batch_size = 0
        "#,
    )
    .expect("valid config");
    assert_eq!(settings.username(), "alice");
    assert_eq!(settings.password(), "secret");
    assert!(settings.has_credentials());
    assert!(!settings.verify_ssl_host);
    assert_eq!(settings.retry_duration(), Duration::ZERO);
    assert_eq!(settings.batch_size(), 1);

    let flags = settings.validate().expect("flags are valid");
    assert!(flags.no_ctag);
    assert!(!flags.update_hack);
}

#[test]
fn test_invalid_toml_is_configuration_error() {
    let err = DavSettings::from_toml_str("sync_urls = 42").expect_err("wrong type");
    assert!(matches!(err, DavError::Configuration(_)));
}

#[test]
fn test_split_url_flags() {
    let (url, flags) =
        UrlFlags::split("https://www.google.com/calendar/dav/?SyncFlags=Google").expect("valid");
    assert_eq!(url, "https://www.google.com/calendar/dav/");
    assert_eq!(
        flags,
        UrlFlags {
            update_hack: true,
            child_hack: true,
            alarm_hack: true,
            no_ctag: false,
        }
    );

    let (url, flags) = UrlFlags::split("https://h/dav/").expect("valid");
    assert_eq!(url, "https://h/dav/");
    assert_eq!(flags, UrlFlags::default());

    let (_, flags) = UrlFlags::split("https://h/?SyncFlags=UpdateHack,NoCTag").expect("valid");
    assert!(flags.update_hack);
    assert!(flags.no_ctag);
    assert!(!flags.child_hack);
}

#[test]
fn test_unknown_flag_and_parameter_are_rejected() {
    let err = UrlFlags::split("https://h/?SyncFlags=Bogus").expect_err("unknown flag");
    assert_eq!(
        err.to_string(),
        "configuration error: unknown flag Bogus in URL https://h/?SyncFlags=Bogus"
    );

    let err = UrlFlags::split("https://h/?foo=bar").expect_err("unknown parameter");
    assert!(err.to_string().contains("unknown parameter foo"));
}

#[test]
fn test_proxy_is_rejected() {
    let settings = DavSettings {
        proxy: Some("http://proxy:3128".to_string()),
        ..DavSettings::default()
    };
    let err = settings.validate().expect_err("proxy unsupported");
    assert!(matches!(err, DavError::Configuration(_)));

    let settings = DavSettings {
        proxy: Some(String::new()),
        ..DavSettings::default()
    };
    assert!(settings.validate().is_ok());
}

#[test]
fn test_huge_durations_are_clamped() {
    let settings = DavSettings {
        retry_duration_secs: u64::MAX,
        retry_interval_secs: u64::MAX,
        request_timeout_secs: u64::MAX,
        ..DavSettings::default()
    };
    let limit = Duration::from_secs(fast_dav_sync::config::MAX_DURATION_SECS);
    assert_eq!(settings.retry_duration(), limit);
    assert_eq!(settings.resend_interval(), limit);
    assert_eq!(settings.request_timeout(), limit);
}
