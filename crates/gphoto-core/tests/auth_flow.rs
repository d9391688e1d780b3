//! Integration tests for credential acquisition against a mock token endpoint.

mod support;

use std::io::Cursor;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use gphoto_core::Error;
use gphoto_core::auth::{
    AuthConfig, AuthFlowEngine, AuthMethod, CallbackServer, CallbackTarget, Console, Credential,
    TokenStore,
};
use support::{SharedOutput, can_bind_localhost, query_param, token_response};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn loopback_config(server: &MockServer) -> AuthConfig {
    let mut config = AuthConfig::new(
        "client-id",
        "client-secret",
        "http://127.0.0.1:0/auth/callback",
        "scope",
        AuthMethod::LocalServer,
    );
    config.token_url = format!("{}/token", server.uri());
    config.open_browser = false;
    config
}

#[tokio::test]
async fn test_loopback_flow_exchanges_the_first_valid_code_once() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=good-code"))
        .and(body_string_contains("client_secret=client-secret"))
        .respond_with(token_response("ya29.fresh", Some("1//refresh")))
        .expect(1)
        .mount(&server)
        .await;

    let output = SharedOutput::default();
    let console = Console::new(std::io::empty(), output.clone());
    let mut engine = AuthFlowEngine::with_console(loopback_config(&server), console);
    let cancel = CancellationToken::new();
    let flow = tokio::spawn(async move { engine.acquire(&cancel).await });

    let auth_url = output.wait_for_line("state=").await;
    let state = query_param(&auth_url, "state");
    let redirect_uri = query_param(&auth_url, "redirect_uri");
    assert!(redirect_uri.starts_with("http://127.0.0.1:"));
    assert!(!redirect_uri.contains(":0/"));
    assert_eq!(query_param(&auth_url, "access_type"), "offline");

    let http = reqwest::Client::new();
    let forged = http
        .get(format!("{redirect_uri}?state=forged&code=evil"))
        .send()
        .await
        .unwrap();
    assert_eq!(forged.status(), 400);
    assert_eq!(forged.text().await.unwrap(), "State mismatch");

    let no_code = http
        .get(format!("{redirect_uri}?state={state}"))
        .send()
        .await
        .unwrap();
    assert_eq!(no_code.status(), 400);
    assert_eq!(no_code.text().await.unwrap(), "No code in request");

    let valid = http
        .get(format!("{redirect_uri}?state={state}&code=good-code"))
        .send()
        .await
        .unwrap();
    assert_eq!(valid.status(), 200);

    // The listener may already be gone; either way this code must not be used.
    let _ = http
        .get(format!("{redirect_uri}?state={state}&code=second-code"))
        .send()
        .await;

    let credential = flow.await.unwrap().unwrap();
    assert_eq!(credential.access_token, "ya29.fresh");
    assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
    assert!(credential.expiry.is_some());
}

#[tokio::test]
async fn test_loopback_timeout_falls_back_to_manual_code() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=pasted-code"))
        .and(body_string_contains("redirect_uri=urn%3Aietf%3Awg%3Aoauth%3A2.0%3Aoob"))
        .respond_with(token_response("ya29.manual", None))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = loopback_config(&server);
    config.callback_timeout = Duration::from_millis(200);
    let output = SharedOutput::default();
    let console = Console::new(Cursor::new("pasted-code\n"), output.clone());
    let mut engine = AuthFlowEngine::with_console(config, console);

    let credential = engine.acquire(&CancellationToken::new()).await.unwrap();

    assert_eq!(credential.access_token, "ya29.manual");
    assert!(output.contents().contains("Switching to manual code entry"));
    assert!(
        output
            .contents()
            .contains("redirect_uri=urn%3Aietf%3Awg%3Aoauth%3A2.0%3Aoob")
    );
}

#[tokio::test]
async fn test_cancel_during_callback_wait_is_not_a_fallback() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("unused", None))
        .expect(0)
        .mount(&server)
        .await;

    let console = Console::new(Cursor::new("never-read\n"), std::io::sink());
    let mut engine = AuthFlowEngine::with_console(loopback_config(&server), console);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = engine.acquire(&cancel).await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_rejected_exchange_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = loopback_config(&server);
    config.method = AuthMethod::ManualCode;
    let console = Console::new(Cursor::new("bad-code\n"), std::io::sink());
    let mut engine = AuthFlowEngine::with_console(config, console);

    let err = engine.acquire(&CancellationToken::new()).await.unwrap_err();
    match err {
        Error::AuthExchange { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected AuthExchange, got {other:?}"),
    }
}

#[tokio::test]
async fn test_manual_flow_without_input_reports_missing_code() {
    let server = MockServer::start().await;
    let mut config = loopback_config(&server);
    config.method = AuthMethod::ManualCode;
    let console = Console::new(Cursor::new("\n\n"), std::io::sink());
    let mut engine = AuthFlowEngine::with_console(config, console);

    let result = engine.acquire(&CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::MissingAuthCode)));
}

#[tokio::test]
async fn test_authorize_reuses_valid_stored_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("unused", None))
        .expect(0)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let store = TokenStore::new(home.path().join("token.json"));
    let stored = Credential {
        access_token: "ya29.stored".to_string(),
        refresh_token: Some("1//stored".to_string()),
        expiry: Some(Utc::now() + TimeDelta::hours(1)),
    };
    store.save(&stored).unwrap();

    let console = Console::new(std::io::empty(), std::io::sink());
    let mut engine = AuthFlowEngine::with_console(loopback_config(&server), console);
    let credential = engine
        .authorize(&store, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(credential, stored);
}

#[tokio::test]
async fn test_authorize_refreshes_expired_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2F%2Fstored"))
        .respond_with(token_response("ya29.refreshed", None))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let store = TokenStore::new(home.path().join("token.json"));
    store
        .save(&Credential {
            access_token: "ya29.stale".to_string(),
            refresh_token: Some("1//stored".to_string()),
            expiry: Some(Utc::now() - TimeDelta::minutes(5)),
        })
        .unwrap();

    let console = Console::new(std::io::empty(), std::io::sink());
    let mut engine = AuthFlowEngine::with_console(loopback_config(&server), console);
    let credential = engine
        .authorize(&store, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(credential.access_token, "ya29.refreshed");
    assert_eq!(credential.refresh_token.as_deref(), Some("1//stored"));
    assert_eq!(store.load().unwrap(), credential);
}

#[tokio::test]
async fn test_callback_server_hands_off_only_the_first_code() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let target = CallbackTarget::from_redirect_uri("http://127.0.0.1:0/cb");
    let mut server = CallbackServer::bind(&target, "expected").await.unwrap();
    let base = target.redirect_uri(server.local_addr().port());

    let http = reqwest::Client::new();
    for code in ["first", "second"] {
        let response = http
            .get(format!("{base}?state=expected&code={code}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }
    let not_found = http
        .get(format!("http://{}/favicon.ico", server.local_addr()))
        .send()
        .await
        .unwrap();
    assert_eq!(not_found.status(), 404);

    assert_eq!(server.code().await.as_deref(), Some("first"));
    server.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_idle_connection_does_not_delay_callback() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let target = CallbackTarget::from_redirect_uri("http://127.0.0.1:0/cb");
    let mut server = CallbackServer::bind(&target, "expected").await.unwrap();
    let base = target.redirect_uri(server.local_addr().port());

    // A browser preconnect: open the socket, send nothing.
    let _idle = tokio::net::TcpStream::connect(server.local_addr())
        .await
        .unwrap();

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        reqwest::get(format!("{base}?state=expected&code=fast")),
    )
    .await
    .expect("callback was served while another connection sat idle")
    .unwrap();
    assert_eq!(response.status(), 200);

    let code = tokio::time::timeout(Duration::from_secs(2), server.code())
        .await
        .unwrap();
    assert_eq!(code.as_deref(), Some("fast"));
    server.shutdown(Duration::from_secs(2)).await;
}
