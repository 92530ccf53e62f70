//! End-to-end session lifecycle against a mock auth server.

use std::sync::{Arc, Mutex};

use authgate_core::auth::FileStorage;
use authgate_core::{
    ApiClient, AuthContext, AuthFailureKind, AuthenticatedFetch, CredentialSubmission, RequestOptions,
    SessionStore,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_auth_server(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(wiremock::matchers::body_json(
            serde_json::json!({"username": "alice", "password": "secret"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "tok123"})))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(wiremock::matchers::body_json(
            serde_json::json!({"username": "alice", "password": "wrong"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/protected"))
        .and(header("authorization", "Bearer tok123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"username": "alice", "address": ""})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_survives_reload_until_server_rejects_token() {
    let server = MockServer::start().await;
    mount_auth_server(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let api = ApiClient::new(server.uri()).unwrap();

    // First "page load": wrong password, then the right one
    {
        let ctx = AuthContext::new(SessionStore::open_default(FileStorage::new(dir.path())));

        let failure = api
            .login(&CredentialSubmission::new("alice", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), AuthFailureKind::InvalidCredentials);
        assert!(!ctx.is_authenticated());

        let session = api
            .login(&CredentialSubmission::new("alice", "secret"))
            .await
            .unwrap();
        ctx.login(session).unwrap();
    }

    // Second "page load": the session is rehydrated and attached
    let ctx = AuthContext::new(SessionStore::open_default(FileStorage::new(dir.path())));
    assert_eq!(ctx.session().unwrap().token, "tok123");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _view = ctx.subscribe(move |state| sink.lock().unwrap().push(state.is_authenticated()));

    let fetch = AuthenticatedFetch::new(api.clone(), ctx.clone());
    let profile: serde_json::Value = fetch.get_json("/api/protected").await.unwrap();
    assert_eq!(profile["username"], "alice");

    // Server revokes the token
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/protected"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = fetch
        .request("/api/protected", RequestOptions::get())
        .await
        .unwrap_err();
    assert!(err.is_auth_rejected());
    assert!(!ctx.is_authenticated());
    assert_eq!(*seen.lock().unwrap(), vec![false]);

    // Third "page load": nothing to rehydrate
    let reloaded = SessionStore::open_default(FileStorage::new(dir.path()));
    assert_eq!(reloaded.get(), None);
}
