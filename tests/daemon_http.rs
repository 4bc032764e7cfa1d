//! End-to-end tests of the HTTP endpoints over TCP.

use std::sync::Arc;

use format_daemon::StepEngine;
use format_daemon_sdk::{DaemonClient, FormatOutcome};
use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn trailing_whitespace_is_trimmed() {
    let project = common::project();
    let daemon = common::spawn_daemon(common::config(project.path()), Arc::new(StepEngine)).await;
    let client = common::http_client();

    let res = client
        .post(format!("{}/", daemon.url()))
        .query(&[("path", "root.txt")])
        .body("hello world  ")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/plain; charset=UTF-8");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hello world\n");

    daemon.controller.begin_draining("test done");
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn canonical_content_is_clean() {
    let project = common::project();
    let daemon = common::spawn_daemon(common::config(project.path()), Arc::new(StepEngine)).await;
    let sdk = DaemonClient::new(&daemon.url());

    let first = sdk.format("root.txt", "a  \nb\t\n\n", false).await.unwrap();
    let FormatOutcome::Formatted(canonical) = first else {
        panic!("expected formatted output, got {first:?}");
    };
    assert_eq!(canonical, b"a\nb\n");

    let canonical = String::from_utf8(canonical).unwrap();
    assert_eq!(sdk.format("root.txt", &canonical, false).await.unwrap(), FormatOutcome::Unchanged);
    assert_eq!(sdk.format("root.txt", &canonical, false).await.unwrap(), FormatOutcome::Unchanged);

    sdk.stop().await.unwrap();
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn uncovered_path_is_404_naming_the_path() {
    let project = common::project();
    let daemon = common::spawn_daemon(common::config(project.path()), Arc::new(StepEngine)).await;
    let client = common::http_client();

    for path in ["notes.md", "does/not/exist.txt"] {
        let res = client
            .post(format!("{}/", daemon.url()))
            .query(&[("path", path)])
            .body("content")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = res.text().await.unwrap();
        assert!(body.contains(path), "body {body:?} should name {path}");
    }

    daemon.controller.begin_draining("test done");
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn missing_path_is_400() {
    let project = common::project();
    let daemon = common::spawn_daemon(common::config(project.path()), Arc::new(StepEngine)).await;
    let client = common::http_client();

    let format = client.post(format!("{}/", daemon.url())).body("x").send().await.unwrap();
    assert_eq!(format.status(), StatusCode::BAD_REQUEST);
    assert_eq!(format.text().await.unwrap(), "Missing path query parameter");

    let dry = client
        .post(format!("{}/?dryrun", daemon.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(dry.status(), StatusCode::BAD_REQUEST);

    let encoding = client.get(format!("{}/encoding", daemon.url())).send().await.unwrap();
    assert_eq!(encoding.status(), StatusCode::BAD_REQUEST);

    daemon.controller.begin_draining("test done");
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn dry_run_returns_empty_success_without_formatting() {
    let project = common::project();
    let engine = Arc::new(common::ProbeEngine::default());
    let daemon = common::spawn_daemon(common::config(project.path()), engine.clone()).await;
    let sdk = DaemonClient::new(&daemon.url());

    assert_eq!(sdk.format("root.txt", "dirty   ", true).await.unwrap(), FormatOutcome::Unchanged);
    assert_eq!(sdk.format("root.txt", "clean\n", true).await.unwrap(), FormatOutcome::Unchanged);
    assert_eq!(engine.cold() + engine.warm(), 0);
    assert_eq!(sdk.status().await.unwrap().warm_rule_sets, 0);

    sdk.stop().await.unwrap();
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn child_build_unit_overrides_root() {
    let project = common::project();
    let daemon = common::spawn_daemon(common::config(project.path()), Arc::new(StepEngine)).await;
    let sdk = DaemonClient::new(&daemon.url());

    // childTxt only replaces `a`; rootTxt would trim and add a newline.
    assert_eq!(
        sdk.format("child/child.txt", "banana  ", false).await.unwrap(),
        FormatOutcome::Formatted(b"bAnAnA  ".to_vec())
    );
    let absolute = project.path().join("root.txt");
    assert_eq!(
        sdk.format(absolute.to_str().unwrap(), "banana  ", false).await.unwrap(),
        FormatOutcome::Formatted(b"banana\n".to_vec())
    );

    sdk.stop().await.unwrap();
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn non_converging_format_is_500_with_best_effort() {
    let project = common::project();
    let daemon = common::spawn_daemon(common::config(project.path()), Arc::new(StepEngine)).await;
    let client = common::http_client();

    let res = client
        .post(format!("{}/", daemon.url()))
        .query(&[("path", "spin.loop")])
        .body("x")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = res.text().await.unwrap();
    assert!(!body.is_empty());
    assert!(body.chars().all(|c| c == 'x'));

    daemon.controller.begin_draining("test done");
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn encoding_endpoint_and_latin1_output() {
    let project = common::project();
    let daemon = common::spawn_daemon(common::config(project.path()), Arc::new(StepEngine)).await;
    let sdk = DaemonClient::new(&daemon.url());
    let client = common::http_client();

    assert_eq!(sdk.encoding("root.txt").await.unwrap().as_deref(), Some("UTF-8"));
    assert_eq!(sdk.encoding("latin.lat").await.unwrap().as_deref(), Some("ISO-8859-1"));
    assert_eq!(sdk.encoding("notes.md").await.unwrap(), None);

    let res = client
        .post(format!("{}/", daemon.url()))
        .query(&[("path", "latin.lat")])
        .header("content-type", "text/plain; charset=UTF-8")
        .body("grüß  ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/plain; charset=ISO-8859-1");
    assert_eq!(res.bytes().await.unwrap().as_ref(), &[0x67, 0x72, 0xFC, 0xDF, b'\n']);

    let res = client
        .get(format!("{}/encoding", daemon.url()))
        .query(&[("path", "latin.lat")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["content-type"], "text/plain; charset=ISO-8859-1");
    assert_eq!(res.text().await.unwrap(), "ISO-8859-1");

    sdk.stop().await.unwrap();
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn body_without_charset_uses_rule_set_encoding() {
    let project = common::project();
    let daemon = common::spawn_daemon(common::config(project.path()), Arc::new(StepEngine)).await;
    let client = common::http_client();

    // Raw Latin-1 file bytes, as `fmtd-cli format` sends them.
    let res = client
        .post(format!("{}/", daemon.url()))
        .query(&[("path", "latin.lat")])
        .body(vec![b'c', b'a', b'f', 0xE9, b' ', b' '])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/plain; charset=ISO-8859-1");
    assert_eq!(res.bytes().await.unwrap().as_ref(), &[b'c', b'a', b'f', 0xE9, b'\n']);

    let res = client
        .post(format!("{}/", daemon.url()))
        .query(&[("path", "latin.lat")])
        .body(vec![b'c', b'a', b'f', 0xE9, b'\n'])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.unwrap().is_empty());

    daemon.controller.begin_draining("test done");
    daemon.join().await.unwrap();
}

#[tokio::test]
async fn liveness_status_and_trailing_slash() {
    let project = common::project();
    let daemon = common::spawn_daemon(common::config(project.path()), Arc::new(StepEngine)).await;
    let sdk = DaemonClient::new(&daemon.url());
    let client = common::http_client();

    assert_eq!(sdk.ping().await.unwrap(), "Format daemon is running");

    let status = sdk.status().await.unwrap();
    assert_eq!(status.state, "listening");
    assert_eq!(status.rule_sets, 4);
    assert_eq!(status.warm_rule_sets, 0);
    assert_eq!(status.version, env!("CARGO_PKG_VERSION"));

    sdk.format("root.txt", "x", false).await.unwrap();
    assert_eq!(sdk.status().await.unwrap().warm_rule_sets, 1);

    let res = client.post(format!("{}/stop/", daemon.url())).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    daemon.join().await.unwrap();
}
