//! Integration tests for member and team folder selection

use serde_json::json;
use sitesync_core::ports::{IRemoteProvider, ProviderArgs};
use sitesync_dropbox::DropboxProvider;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, MEMBER_ID};

#[tokio::test]
async fn test_known_member_and_folder_activate() {
    let (_server, provider) = common::setup_dropbox_mock().await;
    assert!(provider.is_active());
    assert_eq!(provider.code(), "dropbox");
}

#[tokio::test]
async fn test_unknown_member_is_inactive() {
    let server = MockServer::start().await;
    common::mount_team(&server).await;

    let args = ProviderArgs::new("proj", "dropbox")
        .with_presets(Some(common::presets("Nobody", "Studio")));
    let provider = DropboxProvider::with_client(args, common::team_client(&server)).await;
    assert!(!provider.is_active());
}

#[tokio::test]
async fn test_unknown_team_folder_is_inactive() {
    let server = MockServer::start().await;
    common::mount_team(&server).await;

    let args = ProviderArgs::new("proj", "dropbox")
        .with_presets(Some(common::presets("Jane Doe", "Missing")));
    let provider = DropboxProvider::with_client(args, common::team_client(&server)).await;
    assert!(!provider.is_active());
}

#[tokio::test]
async fn test_member_listing_follows_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/team/members/list_v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [
                {"profile": {"team_member_id": "dbmid:john", "name": {"display_name": "John Roe"}}}
            ],
            "cursor": "m1",
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/team/members/list/continue_v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [
                {"profile": {"team_member_id": MEMBER_ID, "name": {"display_name": "Jane Doe"}}}
            ],
            "cursor": "m2",
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let members = common::team_client(&server).team_members().await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[1].team_member_id, MEMBER_ID);
}

#[tokio::test]
async fn test_user_calls_select_member() {
    let (server, provider) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(header("Dropbox-API-Select-User", MEMBER_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [common::folder_entry("Projects", "")],
            "cursor": "c",
            "has_more": false
        })))
        .expect(1..)
        .mount(&server)
        .await;

    let id = provider.create_folder("/Projects").await.unwrap();
    assert_eq!(id, "/Projects");

    let requests = server.received_requests().await.unwrap();
    let listing = requests
        .iter()
        .find(|r| r.url.path() == "/2/files/list_folder")
        .unwrap();
    let root = listing.headers.get("Dropbox-API-Path-Root").unwrap();
    assert!(root.to_str().unwrap().contains(common::NAMESPACE_ID));
}
