#![allow(clippy::unwrap_used)]
// Integration tests for the `Portal` operations and their envelopes.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use uniportal_api::{ControllerVariant, Endpoint, ManualClock};
use uniportal_core::{
    MemoryCredentialStore, Portal, PortalConfig, PortalRequest, StoredCredentials, xor_decrypt,
    xor_encrypt,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn portal_for(store: MemoryCredentialStore) -> Portal {
    let config = PortalConfig::default().with_clock(Arc::new(ManualClock::new()));
    Portal::new(Arc::new(store), config)
}

async fn setup() -> (MockServer, Portal, PortalRequest) {
    let server = MockServer::start().await;
    let store = MemoryCredentialStore::new().with_controller("1", "Office", "admin", "pw", &server.uri());
    (server, portal_for(store), PortalRequest::new(xor_encrypt("1", "")))
}

async fn mount_legacy_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "unifises=s1; Path=/"))
        .mount(server)
        .await;
}

fn to_json(envelope: &uniportal_core::Envelope) -> Value {
    serde_json::to_value(envelope).unwrap()
}

// ── Controllers ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_controllers_issues_keys_sorted_by_name() {
    let store = MemoryCredentialStore::new()
        .with_controller("7", "Zulu", "a", "b", "https://10.0.0.7")
        .with_controller("12", "Alpha", "a", "b", "https://10.0.0.12");
    let portal = portal_for(store);

    let value = to_json(&portal.fetch_controllers());

    assert_eq!(value["status"], "success");
    let controllers = value["data"]["controllers"].as_array().unwrap();
    assert_eq!(controllers[0]["name"], "Alpha");
    assert_eq!(controllers[1]["name"], "Zulu");
    let key = controllers[0]["key"].as_str().unwrap();
    assert_eq!(xor_decrypt(key, "").unwrap(), "12");
}

// ── Connect / detect ────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_reports_system_type() {
    let (server, portal, request) = setup().await;
    mount_legacy_login(&server).await;

    let value = to_json(&portal.connect(&request).await);

    assert_eq!(
        value,
        json!({ "status": "success", "data": { "connected": true, "system_type": "legacy" } })
    );
}

#[tokio::test]
async fn test_detect_system_reprobes() {
    let (server, portal, request) = setup().await;
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "TOKEN=; Path=/"))
        .mount(&server)
        .await;

    let value = to_json(&portal.detect_system(&request).await);
    assert_eq!(value["data"]["system_type"], "modern");
}

#[tokio::test]
async fn test_missing_key_is_a_validation_error() {
    let (_server, portal, _request) = setup().await;

    let value = to_json(&portal.connect(&PortalRequest::default()).await);

    assert_eq!(
        value,
        json!({
            "status": "failed",
            "error": "Invalid input: Controller key is required",
            "validation_error": true
        })
    );
}

#[tokio::test]
async fn test_incomplete_credentials_are_a_validation_error() {
    let mut store = MemoryCredentialStore::new();
    store.insert("5", "Broken", StoredCredentials::default());
    let portal = portal_for(store);

    let envelope = portal.connect(&PortalRequest::new(xor_encrypt("5", ""))).await;

    assert!(envelope.validation_error);
    assert_eq!(
        to_json(&envelope)["error"],
        "Invalid input: Missing required fields: user, password"
    );
}

#[tokio::test]
async fn test_rate_limited_controller_sets_flag() {
    let (server, portal, request) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let value = to_json(&portal.connect(&request).await);

    assert_eq!(value["status"], "failed");
    assert_eq!(value["rate_limited"], true);
    assert!(value["error"].is_array());
}

#[tokio::test]
async fn test_login_failure_lists_connection_errors() {
    let (server, portal, request) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let value = to_json(&portal.fetch_sites(&request).await);

    assert_eq!(value["status"], "failed");
    assert_eq!(
        value["error"],
        json!(["Authentication failed: Failed to connect to UniFi controller (HTTP 401)"])
    );
    assert!(value.get("rate_limited").is_none());
}

// ── Sites / reports ─────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_sites_returns_names() {
    let (server, portal, request) = setup().await;
    mount_legacy_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/self/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "name": "default" }, { "name": "guest" }]
        })))
        .mount(&server)
        .await;

    let value = to_json(&portal.fetch_sites(&request).await);
    assert_eq!(value["data"], json!({ "sites": ["default", "guest"] }));
}

#[tokio::test]
async fn test_report_passes_controller_json_through() {
    let (server, portal, request) = setup().await;
    mount_legacy_login(&server).await;
    let body = json!({ "meta": { "rc": "ok" }, "data": [{ "mac": "aa:bb:cc:dd:ee:ff" }] });
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/sta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .mount(&server)
        .await;

    let envelope = portal.fetch_report(&request, Endpoint::Clients).await;

    assert!(envelope.is_success());
    assert_eq!(envelope.data, Some(body));
}

#[tokio::test]
async fn test_report_routes_can_be_forced() {
    let (server, portal, request) = setup().await;
    mount_legacy_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/proxy/network/v2/api/site/default/aggregated-dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let envelope = portal
        .fetch_report_as(&request, ControllerVariant::Modern, Endpoint::Dashboard)
        .await;
    assert!(envelope.is_success());
}

#[tokio::test]
async fn test_report_rate_limit_sets_flag() {
    let (server, portal, request) = setup().await;
    mount_legacy_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/dashboard"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let value = to_json(&portal.fetch_report(&request, Endpoint::Dashboard).await);

    assert_eq!(value["status"], "failed");
    assert_eq!(value["rate_limited"], true);
}

// ── Reset ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reset_without_key_reports_false() {
    let (_server, portal, _request) = setup().await;

    let value = to_json(&portal.reset_connection(&PortalRequest::default()).await);
    assert_eq!(value, json!({ "status": "success", "data": { "reset": false } }));
}

#[tokio::test]
async fn test_reset_drops_pooled_connection() {
    let (server, portal, request) = setup().await;
    mount_legacy_login(&server).await;

    assert!(portal.connect(&request).await.is_success());
    assert_eq!(portal.pool().pooled_count().await, 1);

    let value = to_json(&portal.reset_connection(&request).await);
    assert_eq!(value["data"]["reset"], true);
    assert_eq!(portal.pool().pooled_count().await, 0);

    assert!(portal.reset_all_connections().await.is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_for_two_sites_stay_on_their_own_site() {
    let (server, portal, request) = setup().await;
    mount_legacy_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/self/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "name": "default" }, { "name": "guest" }]
        })))
        .mount(&server)
        .await;
    for site in ["default", "guest"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/s/{site}/stat/dashboard")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "site": site })))
            .mount(&server)
            .await;
    }

    let default = request.clone().with_site("default");
    let guest = request.with_site("guest");

    for _ in 0..20 {
        let (a, b, c, d) = tokio::join!(
            portal.fetch_report(&default, Endpoint::Dashboard),
            portal.fetch_report(&guest, Endpoint::Dashboard),
            portal.fetch_report(&default, Endpoint::Dashboard),
            portal.fetch_report(&guest, Endpoint::Dashboard),
        );
        for (envelope, site) in [(a, "default"), (b, "guest"), (c, "default"), (d, "guest")] {
            let json = to_json(&envelope);
            assert_eq!(json["status"], "success", "{json}");
            assert_eq!(json["data"]["site"], site);
        }
    }
}
