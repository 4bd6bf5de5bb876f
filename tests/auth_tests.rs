//! Client-credentials token exchange against a mock identity endpoint

use graphctl::credentials::{Credential, CredentialStore};
use graphctl::graph::auth::GraphAuth;
use graphctl::GraphCtlError;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_response(value: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": value,
        "token_type": "Bearer",
        "expires_in": 3599
    }))
}

#[tokio::test]
async fn test_token_exchange_posts_client_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/contoso-tenant/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("client_secret=secret-1"))
        .and(body_string_contains(
            "scope=https%3A%2F%2Fgraph.microsoft.com%2F.default",
        ))
        .respond_with(token_response("token-abc"))
        .expect(1)
        .mount(&server)
        .await;

    let auth = GraphAuth::new(&server.uri());
    let credential = Credential::new("contoso-tenant", "client-1", "secret-1");
    let token = auth.get_token(&credential, &[], false).await.unwrap();

    assert_eq!(token.value, "token-abc");
    assert!(!token.is_expired());
}

#[tokio::test]
async fn test_cached_token_is_reused() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(token_response("cached"))
        .expect(1)
        .mount(&server)
        .await;

    let auth = GraphAuth::new(&server.uri());
    let credential = Credential::new("tenant", "client", "secret");

    let first = auth.get_token(&credential, &[], false).await.unwrap();
    let second = auth.get_token(&credential, &[], false).await.unwrap();
    assert_eq!(first.value, second.value);
}

#[tokio::test]
async fn test_force_refresh_requests_again() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(token_response("fresh"))
        .expect(2)
        .mount(&server)
        .await;

    let auth = GraphAuth::new(&server.uri());
    let credential = Credential::new("tenant", "client", "secret");

    auth.get_token(&credential, &[], false).await.unwrap();
    auth.get_token(&credential, &[], true).await.unwrap();
}

#[tokio::test]
async fn test_expired_token_is_requested_again() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "short-lived",
            "token_type": "Bearer",
            "expires_in": 0
        })))
        .expect(2)
        .mount(&server)
        .await;

    let auth = GraphAuth::new(&server.uri());
    let credential = Credential::new("tenant", "client", "secret");

    let first = auth.get_token(&credential, &[], false).await.unwrap();
    assert!(first.is_expired());
    auth.get_token(&credential, &[], false).await.unwrap();
}

#[tokio::test]
async fn test_different_scopes_are_cached_separately() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(token_response("scoped"))
        .expect(2)
        .mount(&server)
        .await;

    let auth = GraphAuth::new(&server.uri());
    let credential = Credential::new("tenant", "client", "secret");

    auth.get_token(&credential, &[], false).await.unwrap();
    auth.get_token(
        &credential,
        &["https://vault.azure.net/.default".to_string()],
        false,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_provider_error_code_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = GraphAuth::new(&server.uri());
    let credential = Credential::new("tenant", "client", "wrong");

    match auth.get_token(&credential, &[], false).await {
        Err(GraphCtlError::AuthError { code, description }) => {
            assert_eq!(code, "invalid_client");
            assert!(description.contains("AADSTS7000215"));
        }
        other => panic!("expected auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_master_token_uses_stored_credential() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/master-tenant/oauth2/v2.0/token"))
        .and(body_string_contains("client_id=master-client"))
        .respond_with(token_response("master-token"))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new(root.path());
    store
        .save_master_credential("master-tenant", "master-client", "master-secret")
        .await
        .unwrap();

    let auth = GraphAuth::new(&server.uri());
    let token = auth.get_master_token(&store).await.unwrap();
    assert_eq!(token.value, "master-token");
}

#[tokio::test]
async fn test_master_token_without_setup() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .respond_with(token_response("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let auth = GraphAuth::new(&server.uri());
    let store = CredentialStore::new(root.path());
    assert!(matches!(
        auth.get_master_token(&store).await,
        Err(GraphCtlError::MissingCredentials(_))
    ));
}

#[tokio::test]
async fn test_app_token_for_generated_app() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("client_id=reports-client"))
        .respond_with(token_response("app-token"))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new(root.path());
    store
        .save_app_credential("reports", "reports-client", "reports-secret", "tenant-1")
        .await
        .unwrap();

    let auth = GraphAuth::new(&server.uri());
    let token = auth.get_app_token(&store, "reports", &[]).await.unwrap();
    assert_eq!(token.value, "app-token");
}
