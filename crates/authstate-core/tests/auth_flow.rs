//! Integration tests for the sign-in / refresh / sign-out flow

use authstate_core::auth::{FileStorage, MemoryStorage, TokenStorage, REFRESH_TOKEN_KEY};
use authstate_core::{ApiClient, ApiError, AuthClient, AuthError, FetchOptions};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn auth_client(server: &MockServer, storage: Box<dyn TokenStorage>) -> AuthClient {
    let api = ApiClient::new(server.uri()).expect("client");
    AuthClient::new(api, storage)
}

async fn mount_signin(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/users/signin"))
        .and(body_json(json!({"email": "scout@example.com", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "token": "access-1",
                "refresh_token": "refresh-1",
                "user": {"id": 7, "email": "scout@example.com"}
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sign_in_sets_session() {
    let server = MockServer::start().await;
    mount_signin(&server).await;

    let mut auth = auth_client(&server, Box::new(MemoryStorage::new()));
    let signed_in = auth
        .sign_in("scout@example.com", "hunter2")
        .await
        .expect("sign in succeeds");

    assert!(signed_in);
    assert!(auth.session().is_signed_in);
    assert_eq!(auth.session().access_token, "access-1");
    assert_eq!(auth.session().refresh_token, "refresh-1");
    assert_eq!(auth.session().meta["user"]["id"], 7);
}

#[tokio::test]
async fn test_sign_in_twice_does_not_hit_network() {
    let server = MockServer::start().await;
    mount_signin(&server).await;

    let mut auth = auth_client(&server, Box::new(MemoryStorage::new()));
    auth.sign_in("scout@example.com", "hunter2").await.expect("first sign in");

    let err = auth
        .sign_in("scout@example.com", "hunter2")
        .await
        .expect_err("second sign in rejected");
    assert!(matches!(err, AuthError::AlreadySignedIn));
    assert_eq!(err.to_string(), "already logged in");

    let requests = server.received_requests().await.expect("recording");
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_sign_out_when_signed_out_is_an_error() {
    let server = MockServer::start().await;

    let mut auth = auth_client(&server, Box::new(MemoryStorage::new()));
    let err = auth.sign_out().await.expect_err("not signed in");
    assert_eq!(err.to_string(), "not signed in");
    assert!(server.received_requests().await.expect("recording").is_empty());
}

#[tokio::test]
async fn test_sign_out_clears_all_token_state() {
    let server = MockServer::start().await;
    mount_signin(&server).await;

    Mock::given(method("POST"))
        .and(path("/users/signout"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let mut auth = auth_client(&server, Box::new(FileStorage::new(dir.path())));
    auth.sign_in("scout@example.com", "hunter2").await.expect("sign in");

    let success = auth.sign_out().await.expect("sign out");
    assert!(success);

    let session = auth.session();
    assert!(!session.is_signed_in);
    assert!(session.access_token.is_empty());
    assert!(session.refresh_token.is_empty());
    assert!(session.meta.is_empty());

    let storage = FileStorage::new(dir.path());
    assert_eq!(storage.get(REFRESH_TOKEN_KEY).expect("readable"), None);
}

#[tokio::test]
async fn test_refresh_without_token_does_not_hit_network() {
    let server = MockServer::start().await;

    let mut auth = auth_client(&server, Box::new(MemoryStorage::new()));
    let err = auth.refresh_access_token().await.expect_err("no refresh token");
    assert!(matches!(err, AuthError::NotLoggedIn));
    assert_eq!(err.to_string(), "not logged in");
    assert!(server.received_requests().await.expect("recording").is_empty());
}

#[tokio::test]
async fn test_non_ok_response_leaves_session_unchanged() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/signin"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut auth = auth_client(
        &server,
        Box::new(MemoryStorage::with_value(REFRESH_TOKEN_KEY, "refresh-0")),
    );
    let before = auth.session().clone();

    let err = auth.refresh_access_token().await.expect_err("401");
    assert_eq!(err.to_string(), "Unauthorized");
    assert_eq!(*auth.session(), before);

    let err = auth.sign_in("a@b.c", "pw").await.expect_err("503");
    assert_eq!(err.to_string(), "Service Unavailable");
    assert_eq!(*auth.session(), before);
}

#[tokio::test]
async fn test_application_error_is_returned_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/signin"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "invalid email or password"})),
        )
        .mount(&server)
        .await;

    let mut auth = auth_client(&server, Box::new(MemoryStorage::new()));
    let err = auth.sign_in("a@b.c", "wrong").await.expect_err("rejected");
    assert_eq!(err.to_string(), "invalid email or password");
    assert!(!auth.is_signed_in());
}

#[tokio::test]
async fn test_refresh_token_survives_restart() {
    let server = MockServer::start().await;
    mount_signin(&server).await;

    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .and(body_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": "access-2", "refresh_token": "refresh-2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 7}})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut auth = auth_client(&server, Box::new(FileStorage::new(dir.path())));
        auth.sign_in("scout@example.com", "hunter2").await.expect("sign in");
    }

    // New process: access token is gone, refresh token is on disk
    let mut auth = auth_client(&server, Box::new(FileStorage::new(dir.path())));
    assert!(!auth.is_signed_in());
    assert!(auth.has_refresh_token());

    let token = auth.refresh_access_token().await.expect("refresh");
    assert_eq!(token, "access-2");

    let me = auth
        .fetch(FetchOptions::new("users/me").data_key("data"))
        .await
        .expect("authorized request");
    assert_eq!(me, json!({"id": 7}));

    let storage = FileStorage::new(dir.path());
    assert_eq!(
        storage.get(REFRESH_TOKEN_KEY).expect("readable").as_deref(),
        Some("refresh-2")
    );
}

#[tokio::test]
async fn test_refresh_without_data_object_keeps_refresh_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    FileStorage::new(dir.path())
        .set(REFRESH_TOKEN_KEY, "r1")
        .expect("seed storage");

    let mut auth = auth_client(&server, Box::new(FileStorage::new(dir.path())));
    let err = auth.refresh_access_token().await.expect_err("no data object");
    assert!(matches!(err, AuthError::Api(ApiError::InvalidResponse(_))));

    assert!(!auth.is_signed_in());
    assert_eq!(auth.session().refresh_token, "r1");
    let storage = FileStorage::new(dir.path());
    assert_eq!(
        storage.get(REFRESH_TOKEN_KEY).expect("readable").as_deref(),
        Some("r1")
    );
}

#[tokio::test]
async fn test_sign_in_with_null_data_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let mut auth = auth_client(
        &server,
        Box::new(MemoryStorage::with_value(REFRESH_TOKEN_KEY, "r1")),
    );
    let err = auth.sign_in("a@b.c", "pw").await.expect_err("null data");
    assert!(matches!(err, AuthError::Api(ApiError::InvalidResponse(_))));
    assert!(!auth.is_signed_in());
    assert_eq!(auth.session().refresh_token, "r1");
}
