use httpmock::prelude::*;

use gpio_timer::app::run_notify;
use gpio_timer::config::DerbyNetConfig;
use gpio_timer::derbynet::{FORM_CONTENT_TYPE, LEGACY_HELLO_BODY, Notifier};

// base64("Timer:")
const TIMER_BASIC_AUTH: &str = "Basic VGltZXI6";

fn config_for(server: &MockServer, probe: bool) -> DerbyNetConfig {
    DerbyNetConfig {
        base_url: server.base_url(),
        probe_url: probe.then(|| server.url("/probe")),
        ..DerbyNetConfig::default()
    }
}

#[tokio::test]
async fn announce_sends_json_text_as_form() {
    let server = MockServer::start_async().await;
    let action = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/action.php")
                .header("content-type", FORM_CONTENT_TYPE)
                .header("authorization", TIMER_BASIC_AUTH)
                .body(r#"{"action": "timer-message", "message": "HELLO"}"#);
            then.status(200).body("OK");
        })
        .await;

    let notifier = Notifier::new(config_for(&server, false)).unwrap();
    let body = notifier.announce().await.expect("announce succeeds");

    action.assert_async().await;
    assert_eq!(body, "OK");
    assert_eq!(
        LEGACY_HELLO_BODY,
        r#"{"action": "timer-message", "message": "HELLO"}"#
    );
}

#[tokio::test]
async fn announce_returns_error_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/action.php");
            then.status(500).body("error");
        })
        .await;

    let notifier = Notifier::new(config_for(&server, false)).unwrap();
    assert_eq!(notifier.announce().await.unwrap(), "error");
}

#[tokio::test]
async fn probe_is_skipped_without_url() {
    let server = MockServer::start_async().await;
    let probe = server
        .mock_async(|when, then| {
            when.method(GET).path("/probe");
            then.status(200).body("OK");
        })
        .await;

    let notifier = Notifier::new(config_for(&server, false)).unwrap();
    assert_eq!(notifier.probe().await.unwrap(), None);
    probe.assert_hits_async(0).await;
}

#[tokio::test]
async fn notify_prints_both_bodies_then_greeting() {
    let server = MockServer::start_async().await;
    let probe = server
        .mock_async(|when, then| {
            when.method(GET).path("/probe");
            then.status(200).body("OK");
        })
        .await;
    let action = server
        .mock_async(|when, then| {
            when.method(POST).path("/action.php");
            then.status(200).body("OK");
        })
        .await;

    let mut out = Vec::new();
    run_notify(&config_for(&server, true), &mut out)
        .await
        .expect("notify completes");

    probe.assert_async().await;
    action.assert_async().await;
    assert_eq!(String::from_utf8(out).unwrap(), "OK\nOK\nHello from gpio!\n");
}

#[tokio::test]
async fn notify_prints_server_errors_without_failing() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/probe");
            then.status(500).body("error");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/action.php");
            then.status(500).body("error");
        })
        .await;

    let mut out = Vec::new();
    run_notify(&config_for(&server, true), &mut out)
        .await
        .expect("notify completes");

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "error\nerror\nHello from gpio!\n"
    );
}

#[tokio::test]
async fn notify_survives_unreachable_server() {
    let config = DerbyNetConfig {
        base_url: "http://127.0.0.1:9".into(),
        timeout: 1,
        ..DerbyNetConfig::default()
    };

    let mut out = Vec::new();
    run_notify(&config, &mut out).await.expect("notify completes");
    assert_eq!(String::from_utf8(out).unwrap(), "Hello from gpio!\n");
}
