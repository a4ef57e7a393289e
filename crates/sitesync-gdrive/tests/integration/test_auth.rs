//! Integration tests for access token refresh

use serde_json::json;
use sitesync_gdrive::auth::{Credentials, TokenSource};
use sitesync_gdrive::client::GDriveClient;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_refresh_token_is_exchanged_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/root"))
        .and(header("Authorization", "Bearer ya29.fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "root-id",
            "name": "My Drive"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let credentials = Credentials::AuthorizedUser {
        client_id: "client.apps.googleusercontent.com".into(),
        client_secret: "secret".into(),
        refresh_token: "1//refresh".into(),
        token_uri: format!("{}/token", server.uri()),
    };
    let tokens = TokenSource::from_credentials(credentials).unwrap();
    let client = GDriveClient::with_base_urls(
        tokens,
        format!("{}/drive/v3", server.uri()),
        format!("{}/upload/drive/v3", server.uri()),
    );

    assert_eq!(client.get_root().await.unwrap().id, "root-id");
    // second call reuses the cached token
    assert_eq!(client.get_root().await.unwrap().id, "root-id");
}

#[tokio::test]
async fn test_failed_refresh_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let credentials = Credentials::AuthorizedUser {
        client_id: "client".into(),
        client_secret: "secret".into(),
        refresh_token: "revoked".into(),
        token_uri: format!("{}/token", server.uri()),
    };
    let tokens = TokenSource::from_credentials(credentials).unwrap();
    let client = GDriveClient::with_base_urls(tokens, server.uri(), server.uri());

    let err = client.get_root().await.unwrap_err();
    assert!(matches!(err, sitesync_gdrive::GDriveError::Auth(_)));
}
