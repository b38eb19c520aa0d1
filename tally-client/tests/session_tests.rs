//! Session controller transitions and ordering guarantees.

use std::time::Duration;

use serde_json::json;
use tally_client::{GatewayClient, SessionController, TokenStore};
use tally_core::{Session, SessionStatus};
use tally_test_utils::{expired_token, sample_identity, sample_identity_json, valid_token};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn controller_for(server: &MockServer, tokens: TokenStore) -> SessionController {
    let client =
        GatewayClient::with_base_url(&server.uri(), Duration::from_secs(2), tokens).unwrap();
    SessionController::new(client)
}

#[tokio::test]
async fn expired_token_refreshes_to_anonymous_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_identity_json()))
        .expect(0)
        .mount(&server)
        .await;

    let tokens = TokenStore::in_memory();
    tokens.set_record(&expired_token()).unwrap();
    let controller = controller_for(&server, tokens);

    let session = controller.refresh().await;
    assert_eq!(session.status, SessionStatus::Anonymous);
    assert!(session.identity.is_none());
}

#[tokio::test]
async fn valid_token_refreshes_to_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_identity_json()))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = TokenStore::in_memory();
    tokens.set_record(&valid_token()).unwrap();
    let controller = controller_for(&server, tokens);

    let session = controller.refresh().await;
    assert_eq!(session, Session::authenticated(sample_identity()));
    assert_eq!(controller.current(), session);
}

#[tokio::test]
async fn unauthorized_identity_fetch_keeps_token_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "revoked"})))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = TokenStore::in_memory();
    let token = valid_token();
    tokens.set_record(&token).unwrap();
    let controller = controller_for(&server, tokens.clone());

    let session = controller.refresh().await;
    assert_eq!(session.status, SessionStatus::Anonymous);
    assert!(session.identity.is_none());
    assert!(session.last_error.is_some());

    let stored = tokens.get().expect("token store must be untouched");
    assert_eq!(stored.access_token, token.access_token);
}

#[tokio::test]
async fn malformed_identity_body_is_anonymous_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let tokens = TokenStore::in_memory();
    tokens.set_record(&valid_token()).unwrap();
    let session = controller_for(&server, tokens).refresh().await;
    assert_eq!(session.status, SessionStatus::Anonymous);
    assert!(session.last_error.is_some());
}

#[tokio::test]
async fn sign_out_wins_over_in_flight_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_identity_json())
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let tokens = TokenStore::in_memory();
    tokens.set_record(&valid_token()).unwrap();
    let controller = controller_for(&server, tokens.clone());

    let refreshing = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(controller.current().is_loading());

    controller.sign_out();
    let settled = refreshing.await.unwrap();

    assert_eq!(settled, Session::anonymous());
    assert_eq!(controller.current(), Session::anonymous());
    assert!(tokens.get().is_none());
}

#[tokio::test]
async fn newer_refresh_wins_over_older_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_identity_json())
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;

    let tokens = TokenStore::in_memory();
    tokens.set_record(&valid_token()).unwrap();
    let controller = controller_for(&server, tokens.clone());

    let older = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    // The token expires before the second refresh starts.
    tokens.set_record(&expired_token()).unwrap();
    let newer = controller.refresh().await;
    assert_eq!(newer.status, SessionStatus::Anonymous);

    let older = older.await.unwrap();
    assert_eq!(older.status, SessionStatus::Anonymous);
    assert_eq!(controller.current().status, SessionStatus::Anonymous);
}

#[tokio::test]
async fn sign_out_then_refresh_is_anonymous() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_identity_json()))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = TokenStore::in_memory();
    tokens.set_record(&valid_token()).unwrap();
    let controller = controller_for(&server, tokens);

    assert!(controller.refresh().await.is_authenticated());
    controller.sign_out();
    let session = controller.refresh().await;
    assert_eq!(session.status, SessionStatus::Anonymous);
    assert!(session.identity.is_none());
}

#[tokio::test]
async fn sign_in_stores_token_and_authenticates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "fresh", "expires_in": 600})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_identity_json()))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = TokenStore::in_memory();
    let controller = controller_for(&server, tokens.clone());
    let mut updates = controller.subscribe();

    let session = controller.sign_in("dana", "hunter2").await.unwrap();
    assert!(session.is_authenticated());
    assert_eq!(tokens.bearer().as_deref(), Some("fresh"));

    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update().is_authenticated());
}

#[tokio::test]
async fn failed_sign_in_leaves_store_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let tokens = TokenStore::in_memory();
    let controller = controller_for(&server, tokens.clone());
    let err = controller.sign_in("dana", "wrong").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(tokens.get().is_none());
    assert!(controller.current().is_loading());
}
