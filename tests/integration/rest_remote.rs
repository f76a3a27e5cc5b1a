//! REST client against a mock workspace service

use assert_matches::assert_matches;
use pricecraft::remote::{DataAccess, DataAccessError, RestDataAccess};
use pricecraft::shared::AppState;
use reqwest::Url;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "anon-key";

fn rpc_path(function: &str) -> String {
    format!("/rest/v1/rpc/{}", function)
}

async fn client() -> (MockServer, RestDataAccess) {
    let server = MockServer::start().await;
    let url = Url::parse(&server.uri()).unwrap();
    (server, RestDataAccess::new(&url, API_KEY))
}

#[tokio::test]
async fn test_resolve_token_sends_credentials() {
    let (server, remote) = client().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(rpc_path("resolve_workspace_token")))
        .and(header("apikey", API_KEY))
        .and(header("authorization", format!("Bearer {}", API_KEY).as_str()))
        .and(body_partial_json(json!({ "p_token": "share-abc" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "workspace_id": id, "short_name": "shop" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let lookup = remote.resolve_token("share-abc").await.unwrap().unwrap();
    assert_eq!(lookup.id, id);
    assert_eq!(lookup.short_name.as_deref(), Some("shop"));
}

#[tokio::test]
async fn test_unknown_token_resolves_to_none() {
    let (server, remote) = client().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("resolve_workspace_token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert_eq!(remote.resolve_token("nope").await.unwrap(), None);
}

#[tokio::test]
async fn test_fetch_state_validates_document() {
    let (server, remote) = client().await;
    let state = AppState::default();

    Mock::given(method("POST"))
        .and(path(rpc_path("get_workspace_data")))
        .and(body_partial_json(json!({ "p_token": "good" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&state))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("get_workspace_data")))
        .and(body_partial_json(json!({ "p_token": "bad" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": 2,
            "materials": [{ "id": "x", "name": "Yarn" }]
        })))
        .mount(&server)
        .await;

    assert_eq!(remote.fetch_state("good").await.unwrap(), Some(state));
    assert_matches!(
        remote.fetch_state("bad").await,
        Err(DataAccessError::Protocol { .. })
    );
}

#[tokio::test]
async fn test_fetch_state_empty_body_is_none() {
    let (server, remote) = client().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("get_workspace_data")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert_eq!(remote.fetch_state("anything").await.unwrap(), None);
}

#[tokio::test]
async fn test_push_state_sends_whole_state() {
    let (server, remote) = client().await;
    let id = Uuid::new_v4();
    let state = AppState::default();

    Mock::given(method("POST"))
        .and(path(rpc_path("sync_workspace_data")))
        .and(body_partial_json(json!({
            "p_workspace_id": id,
            "p_passphrase": "secret",
            "p_state": { "version": 2 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    assert!(remote.push_state(id, Some("secret"), &state).await.unwrap());
}

#[tokio::test]
async fn test_push_declined_is_false() {
    let (server, remote) = client().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("sync_workspace_data")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(false)))
        .mount(&server)
        .await;

    let pushed = remote
        .push_state(Uuid::new_v4(), Some("wrong"), &AppState::default())
        .await
        .unwrap();
    assert!(!pushed);
}

#[tokio::test]
async fn test_http_status_mapping() {
    let (server, remote) = client().await;

    for (function, status) in [
        ("sync_workspace_data", 401),
        ("verify_workspace_passphrase", 404),
        ("rotate_share_token", 400),
        ("create_workspace", 503),
    ] {
        Mock::given(method("POST"))
            .and(path(rpc_path(function)))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;
    }

    let id = Uuid::new_v4();
    assert_matches!(
        remote.push_state(id, None, &AppState::default()).await,
        Err(DataAccessError::Unauthorized { .. })
    );
    assert_matches!(
        remote.verify_passphrase(id, "x").await,
        Err(DataAccessError::NotFound { .. })
    );
    assert_matches!(
        remote.rotate_share_token(id, Some("x")).await,
        Err(DataAccessError::Rejected { status: 400, .. })
    );
    assert_matches!(
        remote.create_workspace("x").await,
        Err(DataAccessError::Network { .. })
    );
}

#[tokio::test]
async fn test_invalid_json_is_protocol_error() {
    let (server, remote) = client().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("verify_workspace_passphrase")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    assert_matches!(
        remote.verify_passphrase(Uuid::new_v4(), "x").await,
        Err(DataAccessError::Protocol { .. })
    );
}

#[tokio::test]
async fn test_create_workspace_and_rotate() {
    let (server, remote) = client().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(rpc_path("create_workspace")))
        .and(body_partial_json(json!({ "p_passphrase": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": id,
            "short_name": "shop",
            "share_token": "tok-1"
        }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("rotate_share_token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("tok-2")))
        .mount(&server)
        .await;

    let created = remote.create_workspace("secret").await.unwrap();
    assert_eq!(created.id, id);
    assert_eq!(created.share_token.as_deref(), Some("tok-1"));

    let token = remote.rotate_share_token(id, Some("secret")).await.unwrap();
    assert_eq!(token.as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn test_health_check() {
    let (server, remote) = client().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert!(remote.is_reachable().await);

    Mock::given(method("GET"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    assert!(!remote.is_reachable().await);
}

#[tokio::test]
async fn test_unreachable_host() {
    let url = Url::parse("http://127.0.0.1:9/").unwrap();
    let remote = RestDataAccess::new(&url, API_KEY);

    assert!(!remote.is_reachable().await);
    assert_matches!(
        remote.resolve_token("x").await,
        Err(DataAccessError::Network { .. })
    );
}
