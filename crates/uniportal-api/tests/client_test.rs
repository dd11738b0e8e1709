#![allow(clippy::unwrap_used)]
// Integration tests for `ControllerClient` against wiremock controllers.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use uniportal_api::{
    ClientOptions, ControllerClient, ControllerCredentials, ControllerVariant, Endpoint, Error,
    ManualClock,
};

// ── Helpers ─────────────────────────────────────────────────────────

const CSRF: &str = "f00dfeed-1234";

fn client_for(base: &str, clock: &ManualClock) -> ControllerClient {
    let credentials = ControllerCredentials::new("testuser", "testpass", Url::parse(base).unwrap());
    let options = ClientOptions {
        clock: Arc::new(clock.clone()),
        ..ClientOptions::default()
    };
    ControllerClient::new(credentials, options).unwrap()
}

async fn setup() -> (MockServer, ControllerClient, ManualClock) {
    let server = MockServer::start().await;
    let clock = ManualClock::new();
    let client = client_for(&server.uri(), &clock);
    (server, client, clock)
}

fn token_cookie() -> String {
    let payload = URL_SAFE_NO_PAD.encode(json!({ "userId": "u1", "csrfToken": CSRF }).to_string());
    format!("TOKEN=eyJhbGciOiJIUzI1NiJ9.{payload}.c2ln; Path=/; Secure; HttpOnly")
}

/// Root probe answers 200 and login hands out a `TOKEN` cookie.
async fn mount_modern(server: &MockServer) {
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", token_cookie().as_str()))
        .mount(server)
        .await;
}

/// No probe mock (wiremock answers 404) and a classic session cookie.
async fn mount_legacy(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "unifises=abc123; Path=/; HttpOnly")
                .set_body_json(json!({ "meta": { "rc": "ok" }, "data": [] })),
        )
        .mount(server)
        .await;
}

async fn mount_sites(server: &MockServer, at: &str, names: &[&str]) {
    let data: Vec<_> = names
        .iter()
        .map(|name| json!({ "name": name, "desc": name, "role": "admin" }))
        .collect();
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .mount(server)
        .await;
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_modern_login_sends_csrf_header() {
    let (server, mut client, clock) = setup().await;
    mount_modern(&server).await;

    Mock::given(method("GET"))
        .and(path("/proxy/network/v2/api/site/default/aggregated-dashboard"))
        .and(header("x-csrf-token", CSRF))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "wan": { "status": "ok" } })))
        .expect(1)
        .mount(&server)
        .await;

    client.login().await.unwrap();
    assert_eq!(client.detected_variant(), Some(ControllerVariant::Modern));
    assert!(client.is_valid_connection());

    let dashboard = client.dashboard().await.unwrap();
    assert_eq!(dashboard["wan"]["status"], "ok");
    assert_eq!(client.last_response(), Some(&dashboard));

    // probe -> login -> dashboard, each held to the 5s floor
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5), Duration::from_secs(5)]);
}

#[tokio::test]
async fn test_login_posts_credentials_to_exactly_one_endpoint() {
    let (server, mut client, _clock) = setup().await;

    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "testuser", "password": "testpass", "remember": false })))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "TOKEN=; Path=/"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    client.login().await.unwrap();
}

#[tokio::test]
async fn test_legacy_controller_gets_no_csrf_header() {
    let (server, mut client, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", token_cookie().as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/sta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    client.login().await.unwrap();
    assert_eq!(client.detected_variant(), Some(ControllerVariant::Legacy));
    client.clients().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let api_call = requests.last().unwrap();
    assert!(api_call.headers.get("x-csrf-token").is_none());
    assert!(
        api_call.headers.get("cookie").unwrap().to_str().unwrap().starts_with("TOKEN=")
    );
}

#[tokio::test]
async fn test_login_rate_limited() {
    let (server, mut client, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = client.login().await;
    assert!(matches!(result, Err(Error::RateLimited)), "got: {result:?}");
    assert!(!client.is_valid_connection());
    assert!(client.errors().iter().any(Error::is_rate_limited));
}

#[tokio::test]
async fn test_login_rejected() {
    let (server, mut client, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = client.login().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.is_authenticated());
    assert_eq!(client.errors().len(), 1);
}

#[tokio::test]
async fn test_unreachable_controller_is_legacy_and_never_logs_in() {
    let clock = ManualClock::new();
    let mut client = client_for("http://127.0.0.1:1", &clock);

    assert_eq!(client.detect_system().await, ControllerVariant::Legacy);

    let result = client.login().await;
    assert!(
        matches!(result, Err(Error::Transport(_) | Error::Timeout { .. })),
        "got: {result:?}"
    );
    assert!(!client.is_authenticated());
}

// ── API calls ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_json_is_invalid_response() {
    let (server, mut client, _clock) = setup().await;
    mount_legacy(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/device"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    client.login().await.unwrap();
    let result = client.devices().await;

    match result {
        Err(Error::InvalidResponse { body, .. }) => assert_eq!(body, "<html>maintenance</html>"),
        other => panic!("expected InvalidResponse, got: {other:?}"),
    }
    assert!(client.is_error());
}

#[tokio::test]
async fn test_unauthorized_call_drops_session() {
    let (server, mut client, _clock) = setup().await;
    mount_legacy(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/health"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    client.login().await.unwrap();
    let result = client.health().await;

    assert!(matches!(result, Err(Error::ConnectionFailed { status: 401 })));
    assert!(!client.is_valid_connection());
}

#[tokio::test]
async fn test_explicit_variant_overrides_detection() {
    let (server, mut client, _clock) = setup().await;
    mount_modern(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/s/default/get/setting"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "key": "mgmt" }] })))
        .expect(1)
        .mount(&server)
        .await;

    client.login().await.unwrap();
    let settings = client
        .fetch_as(ControllerVariant::Legacy, Endpoint::Settings)
        .await
        .unwrap();
    assert_eq!(settings["data"][0]["key"], "mgmt");
}

#[tokio::test]
async fn test_cookies_accumulate_across_responses() {
    let (server, mut client, _clock) = setup().await;
    mount_legacy(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/sta"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "csrf_token=rotated; Path=/")
                .set_body_json(json!({ "data": [] })),
        )
        .mount(&server)
        .await;

    client.login().await.unwrap();
    client.clients().await.unwrap();

    assert_eq!(
        client.cookies().header_value().as_deref(),
        Some("unifises=abc123; csrf_token=rotated")
    );
}

// ── Sites ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_switch_site_keeps_cache() {
    let (server, mut client, _clock) = setup().await;
    mount_legacy(&server).await;

    let data = json!({ "data": [{ "name": "Default" }, { "name": "Guest" }] });
    Mock::given(method("GET"))
        .and(path("/api/self/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(data))
        .expect(1)
        .mount(&server)
        .await;

    client.switch_to_site("Guest").await.unwrap();
    assert_eq!(client.current_site(), "Guest");

    let sites = client.load_available_sites(false).await.unwrap();
    let names: Vec<_> = sites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Default", "Guest"]);
    assert!(client.has_multiple_sites());
    assert!(!client.is_error());
}

#[tokio::test]
async fn test_unknown_site_leaves_current_site_unchanged() {
    let (server, mut client, _clock) = setup().await;
    mount_legacy(&server).await;
    mount_sites(&server, "/api/self/sites", &["default", "guest"]).await;

    let result = client.switch_to_site("warehouse").await;

    match result {
        Err(Error::SiteNotFound { name, available }) => {
            assert_eq!(name, "warehouse");
            assert_eq!(available, vec!["default", "guest"]);
        }
        other => panic!("expected SiteNotFound, got: {other:?}"),
    }
    assert_eq!(client.current_site(), "default");
    assert!(client.cached_sites().is_none());
    assert_eq!(
        client.error_messages(),
        vec!["Site 'warehouse' not found (available: default, guest)"]
    );
}

#[tokio::test]
async fn test_single_site_accepts_default_sentinel() {
    let (server, mut client, _clock) = setup().await;
    mount_legacy(&server).await;
    mount_sites(&server, "/api/self/sites", &["default"]).await;

    client.switch_to_site("default").await.unwrap();
    assert_eq!(client.current_site(), "default");
    assert_eq!(client.site_count(), 1);
}

#[tokio::test]
async fn test_modern_sites_fall_back_to_second_endpoint() {
    let (server, mut client, _clock) = setup().await;
    mount_modern(&server).await;

    Mock::given(method("GET"))
        .and(path("/proxy/network/api/self/sites"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_sites(&server, "/api/sites", &["default", "branch"]).await;

    let sites = client.load_available_sites(false).await.unwrap();

    assert_eq!(sites.len(), 2);
    assert_eq!(client.site_names(), vec!["default", "branch"]);
    assert!(!client.is_error());
}

#[tokio::test]
async fn test_no_sites_lists_endpoints_tried() {
    let (server, mut client, _clock) = setup().await;
    mount_legacy(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/self/sites"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client.load_available_sites(true).await;

    match result {
        Err(Error::NoSitesFound { endpoints_tried }) => {
            assert_eq!(endpoints_tried, vec!["/api/self/sites"]);
        }
        other => panic!("expected NoSitesFound, got: {other:?}"),
    }
    assert_eq!(client.errors().len(), 1);
}

#[tokio::test]
async fn test_sites_rate_limit_aborts_search() {
    let (server, mut client, _clock) = setup().await;
    mount_modern(&server).await;

    Mock::given(method("GET"))
        .and(path("/proxy/network/api/self/sites"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.load_available_sites(false).await;
    assert!(matches!(result, Err(Error::RateLimited)));
}
