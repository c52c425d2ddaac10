use fast_dav_sync::discovery::{Candidate, Position, Provenance, Tried};
use fast_dav_sync::webdav::DavUri;

fn candidate(path: &str, list: bool) -> Candidate {
    let uri = DavUri::parse(&format!("https://dav.example.com{path}"), true).expect("valid URL");
    Candidate::new(uri, list, Provenance::Configured)
}

#[test]
fn test_candidates_are_queued_once() {
    let mut tried = Tried::default();
    assert!(tried.add_candidate(candidate("/a/", false), Position::Back));
    assert!(!tried.add_candidate(candidate("/a/", false), Position::Front));
    // same URI, different listing flag
    assert!(tried.add_candidate(candidate("/a/", true), Position::Back));
    assert_eq!(tried.pending(), 2);

    // still known after it was taken from the queue
    let next = tried.next_candidate().expect("queued");
    assert!(!tried.add_candidate(next, Position::Front));
}

#[test]
fn test_front_candidates_are_probed_first() {
    let mut tried = Tried::default();
    tried.add_candidate(candidate("/base/", false), Position::Back);
    tried.add_candidate(candidate("/.well-known/carddav/", false), Position::Back);
    tried.add_candidate(candidate("/redirected/", false), Position::Front);

    let order: Vec<String> = std::iter::from_fn(|| tried.next_candidate())
        .map(|c| c.uri.path)
        .collect();
    assert_eq!(order, vec!["/redirected/", "/base/", "/.well-known/carddav/"]);
}

#[test]
fn test_error_is_fatal_only_for_last_option_without_result() {
    let mut tried = Tried::default();
    assert!(tried.error_is_fatal());

    tried.add_candidate(candidate("/a/", false), Position::Back);
    assert!(!tried.error_is_fatal());

    tried.next_candidate();
    assert!(tried.error_is_fatal());

    tried.found_result();
    assert!(!tried.error_is_fatal());
}

#[test]
fn test_dedup_ignores_host_case() {
    let mut tried = Tried::default();
    let upper = DavUri::parse("https://DAV.example.com/x/", true).expect("valid URL");
    let lower = DavUri::parse("https://dav.example.com/x", true).expect("valid URL");
    assert!(tried.add_candidate(Candidate::new(upper, true, Provenance::HomeSet), Position::Front));
    assert!(!tried.add_candidate(Candidate::new(lower, true, Provenance::Member), Position::Back));
}
