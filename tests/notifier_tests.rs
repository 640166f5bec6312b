use manga_reader_bot::config::TelegramConfig;
use manga_reader_bot::identity::Identity;
use manga_reader_bot::notifier::{Backoff, Notify, NotifyError, TelegramNotifier};
use manga_reader_bot::report;
use manga_reader_bot::state::ResumeState;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123:abc";

/// Built and used on a blocking thread; the blocking client must not live on the runtime
fn notifier_for(uri: &str) -> TelegramNotifier {
    let config = TelegramConfig {
        token: TOKEN.to_string(),
        chat_id: "42".to_string(),
    };
    let identity = Identity::with_parts(
        Uuid::parse_str("3f2b8c1e-0000-4000-8000-000000000000").unwrap(),
        "reader",
        "den-pc",
    );
    TelegramNotifier::new(&config, &identity)
        .unwrap()
        .with_api_root(uri)
        .with_backoff(Backoff {
            max_attempts: 3,
            base: Duration::from_millis(1),
        })
}

#[tokio::test]
async fn test_send_text_appends_footer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .and(body_partial_json(serde_json::json!({
            "chat_id": "42",
            "parse_mode": "HTML",
            "disable_notification": true,
        })))
        .and(body_string_contains("reader@den-pc"))
        .and(body_string_contains("3f2b8c1e"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || notifier_for(&uri).send_text("<b>hello</b>", true))
        .await
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_failed_send_is_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(3)
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || notifier_for(&uri).send_text("status", false))
        .await
        .unwrap();

    match result {
        Err(NotifyError::Api { method, status, body }) => {
            assert_eq!(method, "sendMessage");
            assert_eq!(status, 500);
            assert_eq!(body, "upstream down");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_photo_upload_is_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendPhoto", TOKEN)))
        .and(body_string_contains("Current browser state"))
        .and(body_string_contains("name=\"photo\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let screenshot = dir.path().join("current_status.png");
    std::fs::write(&screenshot, b"\x89PNG\r\n\x1a\n").unwrap();

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        notifier_for(&uri).send_photo(&screenshot, "Current browser state")
    })
    .await
    .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_missing_attachment_fails_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        notifier_for(&uri).send_document(std::path::Path::new("/nonexistent/manga_bot_log.txt"), "log")
    })
    .await
    .unwrap();
    assert!(matches!(result, Err(NotifyError::Io(_))));
}

#[tokio::test]
async fn test_long_error_report_arrives_whole() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(2)
        .mount(&server)
        .await;

    let mut state = ResumeState::default();
    state.select("berserk");
    let report = report::error_message(&"<div>".repeat(900), &state);

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let notifier = notifier_for(&uri);
        notifier.send_text(&report, false)?;
        notifier.send_text(&format!("<b>{}</b>", "&amp;".repeat(1000)), false)
    })
    .await
    .unwrap();
    assert!(result.is_ok());

    let requests = server.received_requests().await.unwrap();
    let texts: Vec<String> = requests
        .iter()
        .map(|request| {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            body["text"].as_str().unwrap().to_string()
        })
        .collect();

    let error = &texts[0];
    assert!(error.chars().count() <= 4096);
    assert!(error.contains("</pre>\n📚 Title: berserk"));
    assert!(error.ends_with("🆔 ID: 3f2b8c1e"));

    let plain = &texts[1];
    assert!(plain.chars().count() <= 4096);
    assert!(plain.contains("&amp;</b>\n👤 User: reader@den-pc"));
}
