// tests/mirror.rs

//! End-to-end mirror runs against a scripted pair of sites

mod common;

use common::{
    FakeCookbook, FakeSiteClient, SOURCE, TARGET, USER, Workspace, artifact_bytes,
    cookbook_record, download_url, recording_reporter, universe, with_source_version,
};
use serde_json::json;
use std::time::Duration;
use supermarket_mirror::repository::endpoints;
use supermarket_mirror::{
    Error, Mirror, MirrorConfig, MirrorEvent, MirrorRequest, MirrorSummary, Result,
    TransferOutcome,
};

fn run(
    client: &FakeSiteClient,
    config: &MirrorConfig,
    request: &MirrorRequest,
) -> (Result<MirrorSummary>, Vec<MirrorEvent>) {
    let (events, reporter) = recording_reporter();
    let result = Mirror::new(client, config, &reporter).run(request);
    let events = events.lock().unwrap().clone();
    (result, events)
}

/// Source has cookbooks A and B, target only A
fn one_missing_cookbook() -> FakeSiteClient {
    let a = FakeCookbook::new("A", "1.0.0", json!({}));
    let b = FakeCookbook::new("B", "1.0.0", json!({}));
    let client = FakeSiteClient::new()
        .json(endpoints::universe_url(TARGET), universe(&[&a]))
        .json(endpoints::universe_url(SOURCE), universe(&[&a, &b]))
        .json(
            endpoints::cookbook_url(SOURCE, "B"),
            cookbook_record("B", &["1.0.0"], Some("1.0.0")),
        );
    with_source_version(client, "B", "1.0.0", json!({}))
}

fn finished_outcomes(events: &[MirrorEvent]) -> Vec<TransferOutcome> {
    events
        .iter()
        .filter_map(|event| match event {
            MirrorEvent::VersionFinished { outcome, .. } => Some(outcome.clone()),
            _ => None,
        })
        .collect()
}

fn version_fetches(client: &FakeSiteClient) -> Vec<String> {
    client
        .requests()
        .into_iter()
        .filter(|url| url.contains("/versions/") && !url.ends_with("/download"))
        .collect()
}

#[test]
fn test_mirror_everything_uploads_missing_cookbook() {
    let ws = Workspace::new();
    let client = one_missing_cookbook().upload_reply(201, "ok");

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    let summary = result.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.total(), 1);

    let uploads = client.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].url, "https://PRIVATE/api/v1/cookbooks");
    assert_eq!(uploads[0].user_id, USER);
    assert!(uploads[0].tarball_existed);
    assert_eq!(uploads[0].tarball, artifact_bytes("B", "1.0.0"));
    assert_eq!(uploads[0].manifest, r#"{"category":""}"#);

    assert!(events.contains(&MirrorEvent::MissingCookbooks {
        missing: 1,
        total: 2
    }));
    assert_eq!(finished_outcomes(&events), vec![TransferOutcome::Success]);
    assert!(ws.staged_files().is_empty());
}

#[test]
fn test_rejection_message_is_reported() {
    let ws = Workspace::new();
    let client =
        one_missing_cookbook().upload_reply(999, r#"{"error_messages": ["some error description"]}"#);

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    assert_eq!(result.unwrap().rejected, 1);
    assert_eq!(
        finished_outcomes(&events),
        vec![TransferOutcome::UploadRejected("some error description".to_string())]
    );
}

#[test]
fn test_server_error_reports_body() {
    let ws = Workspace::new();
    let client = one_missing_cookbook().upload_reply(500, "some_error");

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    assert_eq!(result.unwrap().errored, 1);
    assert_eq!(
        finished_outcomes(&events),
        vec![TransferOutcome::UploadError("some_error".to_string())]
    );
}

#[test]
fn test_keep_moves_failed_artifact() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.keep_failed = true;
    let client =
        one_missing_cookbook().upload_reply(999, r#"{"error_messages": ["some error description"]}"#);

    let (result, events) = run(&client, &config, &MirrorRequest::Everything);
    result.unwrap();

    let kept = ws.keep_dir().join("B-1.0.0.tar.gz");
    assert!(kept.is_file());
    assert_eq!(std::fs::read(&kept).unwrap(), artifact_bytes("B", "1.0.0"));
    assert!(ws.staged_files().is_empty());
    assert!(events.contains(&MirrorEvent::ArtifactKept {
        cookbook: "B".to_string(),
        version: "1.0.0".to_string(),
        path: kept,
    }));
}

#[test]
fn test_failed_artifact_deleted_without_keep() {
    let ws = Workspace::new();
    let client = one_missing_cookbook().upload_reply(422, r#"{"error_messages": ["bad category"]}"#);

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    assert_eq!(result.unwrap().rejected, 1);
    assert!(ws.staged_files().is_empty());
    assert!(!ws.keep_dir().exists());
    assert!(!events
        .iter()
        .any(|event| matches!(event, MirrorEvent::ArtifactKept { .. })));
}

#[test]
fn test_no_missing_cookbooks_uploads_nothing() {
    let ws = Workspace::new();
    let a = FakeCookbook::new("A", "1.0.0", json!({}));
    let b = FakeCookbook::new("B", "1.0.0", json!({}));
    let client = FakeSiteClient::new()
        .json(endpoints::universe_url(SOURCE), universe(&[&a]))
        .json(endpoints::universe_url(TARGET), universe(&[&a, &b]));

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    assert_eq!(result.unwrap().total(), 0);
    assert!(client.uploads().is_empty());
    assert!(events.contains(&MirrorEvent::RemovedCookbooks { count: 1 }));
}

#[test]
fn test_dependency_drift_is_reported_without_transfer() {
    let ws = Workspace::new();
    let before = FakeCookbook::new("A", "1.0.0", json!({}));
    let after = FakeCookbook::new("A", "1.0.0", json!({ "B": ">= 1.0.0" }));
    let client = FakeSiteClient::new()
        .json(endpoints::universe_url(SOURCE), universe(&[&after]))
        .json(endpoints::universe_url(TARGET), universe(&[&before]));

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    assert_eq!(result.unwrap().total(), 0);
    assert!(events.contains(&MirrorEvent::DependencyDrift {
        entry: "A 1.0.0".to_string()
    }));
}

/// Source has B and C, target has nothing
fn two_missing_cookbooks() -> FakeSiteClient {
    let b = FakeCookbook::new("B", "1.0.0", json!({}));
    let c = FakeCookbook::new("C", "1.0.0", json!({}));
    let client = FakeSiteClient::new()
        .json(endpoints::universe_url(TARGET), json!({}))
        .json(endpoints::universe_url(SOURCE), universe(&[&b, &c]));
    let client = with_source_version(client, "B", "1.0.0", json!({}));
    with_source_version(client, "C", "1.0.0", json!({}))
}

#[test]
fn test_fatal_upload_halts_run() {
    let ws = Workspace::new();
    let client = two_missing_cookbooks().upload_unreachable("connection refused");

    let (result, _events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    match result {
        Err(Error::UploadTransport {
            cookbook,
            version,
            site,
            message,
        }) => {
            assert_eq!(cookbook, "B");
            assert_eq!(version, "1.0.0");
            assert_eq!(site, TARGET);
            assert!(message.contains("connection refused"));
        }
        other => panic!("expected a fatal upload error, got {:?}", other),
    }

    assert_eq!(client.uploads().len(), 1);
    assert!(
        !client
            .requests()
            .contains(&endpoints::version_url(SOURCE, "C", "1.0.0"))
    );
    assert!(ws.staged_files().is_empty());
}

#[test]
fn test_fatal_upload_keeps_artifact_when_asked() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.keep_failed = true;
    let client = two_missing_cookbooks().upload_unreachable("connection refused");

    let (result, _events) = run(&client, &config, &MirrorRequest::Everything);
    assert!(matches!(result, Err(Error::UploadTransport { .. })));
    assert!(ws.keep_dir().join("B-1.0.0.tar.gz").is_file());
    assert!(ws.staged_files().is_empty());
}

#[test]
fn test_missing_version_record_continues() {
    let ws = Workspace::new();
    let b = FakeCookbook::new("B", "1.0.0", json!({}));
    let c = FakeCookbook::new("C", "1.0.0", json!({}));
    let client = FakeSiteClient::new()
        .json(endpoints::universe_url(TARGET), json!({}))
        .json(endpoints::universe_url(SOURCE), universe(&[&b, &c]))
        .not_found(endpoints::version_url(SOURCE, "B", "1.0.0"));
    let client = with_source_version(client, "C", "1.0.0", json!({}));

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    let summary = result.unwrap();
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(client.uploads().len(), 1);
    assert_eq!(
        finished_outcomes(&events),
        vec![TransferOutcome::NotFound, TransferOutcome::Success]
    );
}

#[test]
fn test_malformed_version_stops_before_any_transfer() {
    let ws = Workspace::new();
    let good = FakeCookbook::new("B", "1.0.0", json!({}));
    let bad = FakeCookbook::new("B", "1.x", json!({}));
    let client = FakeSiteClient::new()
        .json(endpoints::universe_url(TARGET), json!({}))
        .json(endpoints::universe_url(SOURCE), universe(&[&good, &bad]));

    let (result, _events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    assert!(matches!(result, Err(Error::MalformedVersion { .. })));
    assert!(client.uploads().is_empty());
}

#[test]
fn test_deprecation_notice_once_per_cookbook() {
    let ws = Workspace::new();
    let v1 = FakeCookbook::new("B", "1.0.0", json!({}));
    let v2 = FakeCookbook::new("B", "1.1.0", json!({}));
    let mut record = cookbook_record("B", &["1.0.0", "1.1.0"], Some("1.1.0"));
    record["deprecated"] = json!(true);
    record["replacement"] = json!("https://COMMUNITY/api/v1/cookbooks/B2");

    let client = FakeSiteClient::new()
        .json(endpoints::universe_url(TARGET), json!({}))
        .json(endpoints::universe_url(SOURCE), universe(&[&v1, &v2]))
        .json(endpoints::cookbook_url(SOURCE, "B"), record);
    let client = with_source_version(client, "B", "1.0.0", json!({}));
    let client = with_source_version(client, "B", "1.1.0", json!({}));

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::Everything);
    assert_eq!(result.unwrap().succeeded, 2);

    let notices: Vec<&MirrorEvent> = events
        .iter()
        .filter(|event| matches!(event, MirrorEvent::Deprecated { .. }))
        .collect();
    assert_eq!(
        notices,
        vec![&MirrorEvent::Deprecated {
            cookbook: "B".to_string(),
            replacement: Some("B2".to_string()),
        }]
    );
}

#[test]
fn test_all_versions_in_ascending_order() {
    let ws = Workspace::new();
    let client = FakeSiteClient::new()
        .json(
            endpoints::cookbook_url(SOURCE, "B"),
            cookbook_record("B", &["1.10.0", "0.9.0", "1.2.0", "1.0.0"], Some("1.10.0")),
        )
        .json(
            endpoints::cookbook_url(TARGET, "B"),
            cookbook_record("B", &["1.0.0"], Some("1.0.0")),
        );
    let client = with_source_version(client, "B", "0.9.0", json!({}));
    let client = with_source_version(client, "B", "1.2.0", json!({}));
    let client = with_source_version(client, "B", "1.10.0", json!({}));

    let request = MirrorRequest::from_args("B", Some("all"));
    let (result, events) = run(&client, &ws.config(), &request);
    assert_eq!(result.unwrap().succeeded, 3);
    assert_eq!(
        version_fetches(&client),
        vec![
            "https://COMMUNITY/api/v1/cookbooks/B/versions/0_9_0",
            "https://COMMUNITY/api/v1/cookbooks/B/versions/1_2_0",
            "https://COMMUNITY/api/v1/cookbooks/B/versions/1_10_0",
        ]
    );
    assert!(events.contains(&MirrorEvent::CookbookStarted {
        cookbook: "B".to_string(),
        versions: 3
    }));
}

#[test]
fn test_all_versions_when_target_lacks_cookbook() {
    let ws = Workspace::new();
    let client = FakeSiteClient::new().json(
        endpoints::cookbook_url(SOURCE, "B"),
        cookbook_record("B", &["1.0.0", "1.1.0"], Some("1.1.0")),
    );
    let client = with_source_version(client, "B", "1.0.0", json!({}));
    let client = with_source_version(client, "B", "1.1.0", json!({}));

    let (result, _events) = run(&client, &ws.config(), &MirrorRequest::from_args("B", Some("all")));
    assert_eq!(result.unwrap().succeeded, 2);
    assert_eq!(client.uploads().len(), 2);
}

#[test]
fn test_exact_version_url_uses_underscores() {
    let ws = Workspace::new();
    let client = FakeSiteClient::new().json(
        endpoints::cookbook_url(SOURCE, "B"),
        cookbook_record("B", &["1.0.0"], Some("1.0.0")),
    );
    let client = with_source_version(client, "B", "1.0.0", json!({}));

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::from_args("B", Some("1.0.0")));
    assert_eq!(result.unwrap().succeeded, 1);
    assert_eq!(
        version_fetches(&client),
        vec!["https://COMMUNITY/api/v1/cookbooks/B/versions/1_0_0"]
    );
    assert!(events.contains(&MirrorEvent::VersionStarted {
        cookbook: "B".to_string(),
        version: "1.0.0".to_string()
    }));
}

#[test]
fn test_version_record_without_version_uses_requested_one() {
    let ws = Workspace::new();
    let client = FakeSiteClient::new()
        .json(
            endpoints::cookbook_url(SOURCE, "B"),
            cookbook_record("B", &["1.0.0"], Some("1.0.0")),
        )
        .json(
            endpoints::version_url(SOURCE, "B", "1.0.0"),
            json!({ "file": download_url(SOURCE, "B", "1.0.0") }),
        )
        .artifact(
            download_url(SOURCE, "B", "1.0.0"),
            artifact_bytes("B", "1.0.0").as_slice(),
        );

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::from_args("B", Some("1.0.0")));
    assert_eq!(result.unwrap().succeeded, 1);
    assert_eq!(client.uploads().len(), 1);
    assert!(events.contains(&MirrorEvent::VersionStarted {
        cookbook: "B".to_string(),
        version: "1.0.0".to_string()
    }));
}

#[test]
fn test_failure_line_names_cookbook_version_and_target() {
    let ws = Workspace::new();
    let client = FakeSiteClient::new().json(
        endpoints::cookbook_url(SOURCE, "B"),
        cookbook_record("B", &["1.0.0"], Some("1.0.0")),
    );
    let client = with_source_version(client, "B", "1.0.0", json!({}))
        .upload_reply(422, r#"{"error_messages": ["bad category"]}"#);

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::from_args("B", Some("1.0.0")));
    assert_eq!(result.unwrap().rejected, 1);

    let failures: Vec<String> = events
        .iter()
        .filter(|event| matches!(event, MirrorEvent::VersionFinished { .. }))
        .map(|event| event.to_string())
        .collect();
    assert_eq!(
        failures,
        vec!["B (1.0.0) failed on https://PRIVATE: bad category"]
    );
}

/// Cookbook A whose latest version depends on b, c and an unknown cookbook
///
/// b 2.0.0 depends on c 1.0.0 in turn, and c is fully routable.
fn cookbook_with_dependencies() -> FakeSiteClient {
    let dependency_universe = universe(&[
        &FakeCookbook::new("b", "1.0.0", json!({})),
        &FakeCookbook::new("b", "1.2.0", json!({})),
        &FakeCookbook::new("b", "2.0.0", json!({})),
        &FakeCookbook::new("c", "1.0.0", json!({})),
    ]);
    let client = FakeSiteClient::new()
        .json(
            endpoints::cookbook_url(SOURCE, "A"),
            cookbook_record("A", &["1.0.0", "2.0.0"], Some("2.0.0")),
        )
        .json(endpoints::universe_url(SOURCE), dependency_universe)
        .json(
            endpoints::cookbook_url(SOURCE, "b"),
            cookbook_record("b", &["1.0.0", "1.2.0", "2.0.0"], Some("2.0.0")),
        );
    let client = with_source_version(
        client,
        "A",
        "2.0.0",
        json!({ "b": ">= 1.1.0", "c": "~> 9.0", "missing": ">= 0.0.0" }),
    );
    let client = with_source_version(client, "b", "2.0.0", json!({ "c": ">= 0.0.0" }));
    with_source_version(
        client.json(
            endpoints::cookbook_url(SOURCE, "c"),
            cookbook_record("c", &["1.0.0"], Some("1.0.0")),
        ),
        "c",
        "1.0.0",
        json!({}),
    )
}

#[test]
fn test_latest_with_dependencies() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.include_dependencies = true;
    let client = cookbook_with_dependencies();

    let (result, events) = run(&client, &config, &MirrorRequest::from_args("A", None));
    assert_eq!(result.unwrap().succeeded, 2);

    let uploads = client.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].tarball, artifact_bytes("A", "2.0.0"));
    assert_eq!(uploads[1].tarball, artifact_bytes("b", "2.0.0"));

    assert!(events.contains(&MirrorEvent::DependencyResolved {
        cookbook: "b".to_string(),
        constraint: ">= 1.1.0".to_string(),
        version: "2.0.0".to_string(),
    }));
    let unresolved: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            MirrorEvent::DependencyUnresolved { cookbook, .. } => Some(cookbook.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(unresolved, vec!["c", "missing"]);
}

#[test]
fn test_dependencies_are_followed_one_level_only() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.include_dependencies = true;
    let client = cookbook_with_dependencies();

    let (result, _events) = run(&client, &config, &MirrorRequest::from_args("A", None));
    result.unwrap();

    let tarballs: Vec<Vec<u8>> = client.uploads().into_iter().map(|u| u.tarball).collect();
    assert_eq!(
        tarballs,
        vec![artifact_bytes("A", "2.0.0"), artifact_bytes("b", "2.0.0")]
    );
    assert!(!tarballs.contains(&artifact_bytes("c", "1.0.0")));

    let universe_fetches = client
        .requests()
        .into_iter()
        .filter(|url| *url == endpoints::universe_url(SOURCE))
        .count();
    assert_eq!(universe_fetches, 1);
    assert!(
        !client
            .requests()
            .contains(&endpoints::version_url(SOURCE, "c", "1.0.0"))
    );
}

#[test]
fn test_latest_without_deps_flag_skips_dependencies() {
    let ws = Workspace::new();
    let client = cookbook_with_dependencies();

    let (result, _events) = run(&client, &ws.config(), &MirrorRequest::from_args("A", None));
    assert_eq!(result.unwrap().succeeded, 1);
    assert_eq!(client.uploads().len(), 1);
    assert!(
        !client
            .requests()
            .contains(&endpoints::universe_url(SOURCE))
    );
}

#[test]
fn test_unknown_latest_cookbook_is_not_found() {
    let ws = Workspace::new();
    let client = FakeSiteClient::new();

    let (result, events) = run(&client, &ws.config(), &MirrorRequest::from_args("ghost", None));
    assert_eq!(result.unwrap().not_found, 1);
    assert!(client.uploads().is_empty());
    assert_eq!(finished_outcomes(&events), vec![TransferOutcome::NotFound]);
}

#[test]
fn test_cookbook_metadata_failure_is_fatal() {
    let ws = Workspace::new();
    let client = FakeSiteClient::new()
        .failing(endpoints::cookbook_url(SOURCE, "B"), "HTTP 502 Bad Gateway");

    let (result, _events) = run(&client, &ws.config(), &MirrorRequest::from_args("B", Some("1.0.0")));
    match result {
        Err(Error::MetadataFetch { cookbook, site, .. }) => {
            assert_eq!(cookbook, "B");
            assert_eq!(site, SOURCE);
        }
        other => panic!("expected a metadata error, got {:?}", other),
    }
    assert!(client.uploads().is_empty());
}

#[test]
fn test_version_metadata_failure_is_fatal() {
    let ws = Workspace::new();
    let client = FakeSiteClient::new()
        .json(
            endpoints::cookbook_url(SOURCE, "B"),
            cookbook_record("B", &["1.0.0"], Some("1.0.0")),
        )
        .failing(endpoints::version_url(SOURCE, "B", "1.0.0"), "HTTP 503");

    let (result, _events) = run(&client, &ws.config(), &MirrorRequest::from_args("B", Some("1.0.0")));
    assert!(matches!(result, Err(Error::MetadataFetch { .. })));
}

#[test]
fn test_throttle_and_replacement_notices() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.delay = Some(Duration::from_millis(1));
    config.include_replacements = true;
    let client = one_missing_cookbook();

    let (result, events) = run(&client, &config, &MirrorRequest::Everything);
    assert_eq!(result.unwrap().succeeded, 1);
    assert!(events.contains(&MirrorEvent::Throttle {
        delay: Duration::from_millis(1)
    }));
    assert!(events.iter().any(
        |event| matches!(event, MirrorEvent::Notice(text) if text.contains("not supported"))
    ));
}
