mod common;

use common::{FakeSmtpServer, Script, ScriptedVerifier, ServerBehavior};
use reqwest::StatusCode;
use serde_json::{json, Value};
use smtp_probe_core::service::server::{router, AppState};
use smtp_probe_core::{Config, ErrorKind, SmtpVerifier, Verifier};
use std::sync::Arc;

async fn spawn_app<V>(verifier: V) -> String
where
    V: Verifier + Clone + Send + Sync + 'static,
{
    let state = Arc::new(AppState::new(Config::default(), verifier));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn post(base: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

fn single_request(port: Value, secure: &str) -> Value {
    json!({
        "host": "smtp.example.com",
        "port": port,
        "secure": secure,
        "user": "alice@example.com",
        "pass": "s3cret-pass",
        "from": "",
        "to": "bob@example.com"
    })
}

#[tokio::test]
async fn single_test_success_returns_details() {
    let base = spawn_app(ScriptedVerifier::new([("STARTTLS (587)", Script::Send)])).await;

    let (status, body) = post(&base, "/api/test-smtp", single_request(json!("587"), "false")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["details"]["messageId"], json!("<587@fake.test>"));
    assert_eq!(body["details"]["response"], json!("250 2.0.0 Ok: queued"));
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn single_test_failure_is_500_with_guidance() {
    let base = spawn_app(ScriptedVerifier::new([(
        "SSL/TLS (465)",
        Script::Fail(ErrorKind::AuthenticationFailed),
    )]))
    .await;

    let (status, body) = post(&base, "/api/test-smtp", single_request(json!(465), "true")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("SMTP Test Failed"));
    assert_eq!(body["error"], json!("scripted EAUTH"));
    assert_eq!(body["errorKind"], json!("authentication_failed"));
    assert_eq!(body["guidance"]["title"], json!("Authentication Failed"));
    assert!(body["guidance"]["tips"].as_array().unwrap().len() >= 3);
}

#[tokio::test]
async fn invalid_input_is_rejected_with_400() {
    let base = spawn_app(ScriptedVerifier::default()).await;

    let mut missing_host = single_request(json!(587), "false");
    missing_host["host"] = json!("");
    let (status, body) = post(&base, "/api/test-smtp", missing_host).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid request"));

    let (status, body) = post(&base, "/api/test-smtp", single_request(json!("abc"), "false")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("abc"));

    let mut bad_recipient = single_request(json!(587), "false");
    bad_recipient["to"] = json!("not an address");
    let (status, _) = post(&base, "/api/test-smtp", bad_recipient).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = reqwest::Client::new()
        .post(format!("{}/api/test-smtp", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn auto_discovery_reports_all_candidates() {
    let base = spawn_app(ScriptedVerifier::new([
        ("SSL/TLS (465)", Script::Send),
        ("Unencrypted (25)", Script::Fail(ErrorKind::Timeout)),
    ]))
    .await;

    let (status, body) = post(
        &base,
        "/api/auto-test-smtp",
        json!({
            "host": "smtp.example.com",
            "user": "alice@example.com",
            "pass": "pw",
            "to": "bob@example.com"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["totalTests"], json!(7));
    assert_eq!(body["successfulConfigs"], json!(1));
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 7);
    assert_eq!(results[0]["config"], json!("STARTTLS (587)"));
    assert_eq!(results[0]["status"], json!("failed"));
    assert_eq!(results[1]["config"], json!("SSL/TLS (465)"));
    assert_eq!(results[1]["secure"], json!(true));
    assert_eq!(results[1]["status"], json!("success"));
    assert_eq!(results[1]["messageId"], json!("<465@fake.test>"));
    assert_eq!(results[4]["errorKind"], json!("timeout"));
    assert_eq!(results[4]["secure"], json!(false));
}

#[tokio::test]
async fn auto_discovery_requires_recipient() {
    let base = spawn_app(ScriptedVerifier::default()).await;

    let (status, body) = post(
        &base,
        "/api/auto-test-smtp",
        json!({ "host": "smtp.example.com", "user": "alice@example.com", "pass": "pw" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn version_endpoint_reports_package_version() {
    let base = spawn_app(ScriptedVerifier::default()).await;

    let body: Value = reqwest::get(format!("{}/api/version", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
    assert!(body["hash"].is_string());
    assert!(body["date"].is_string());
}

#[tokio::test]
async fn single_test_end_to_end_against_local_server() {
    let server = FakeSmtpServer::start(ServerBehavior::default()).await;
    let base = spawn_app(SmtpVerifier::new(&Config::default())).await;

    let mut request = single_request(json!(server.port()), "false");
    request["host"] = json!("127.0.0.1");
    let (status, body) = post(&base, "/api/test-smtp", request).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], json!(true));
    let message_id = body["details"]["messageId"].as_str().unwrap();
    assert!(message_id.ends_with("@example.com>"));

    let sent = server.messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Subject: SMTP Test - Advanced SMTP Tester"));
    assert!(!sent[0].contains("s3cret-pass"));
}
