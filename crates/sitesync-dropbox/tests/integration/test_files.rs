//! Integration tests for folder and file management routes

use serde_json::json;
use sitesync_core::domain::ProviderError;
use sitesync_core::ports::IRemoteProvider;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, file_entry, folder_entry};

#[tokio::test]
async fn test_create_existing_folder_returns_path() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "", json!([folder_entry("Projects", "")])).await;

    Mock::given(method("POST"))
        .and(path("/2/files/create_folder_v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    assert_eq!(provider.create_folder("/Projects").await.unwrap(), "/Projects");
}

#[tokio::test]
async fn test_create_missing_folder() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([])).await;

    Mock::given(method("POST"))
        .and(path("/2/files/create_folder_v2"))
        .and(body_partial_json(json!({"path": "/Projects/shots"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"name": "shots", "path_display": "/Projects/shots", "id": "id:s"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = provider.create_folder("/Projects/shots").await.unwrap();
    assert_eq!(created, "/Projects/shots");
}

#[tokio::test]
async fn test_list_folder_follows_cursor() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "", json!([folder_entry("Projects", "")])).await;

    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(body_partial_json(json!({"path": "/Projects"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [folder_entry("shots", "/Projects")],
            "cursor": "page-2",
            "has_more": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder/continue"))
        .and(body_partial_json(json!({"cursor": "page-2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [file_entry("edit.mov", "/Projects")],
            "cursor": "page-3",
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let names = provider.list_folder("/Projects").await.unwrap();
    assert_eq!(names, vec!["shots", "edit.mov"]);
}

#[tokio::test]
async fn test_list_missing_folder_is_not_found() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "", json!([])).await;

    let err = provider.list_folder("/Projects").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_missing_file_is_not_found() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([])).await;

    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let err = provider.delete_file("/Projects/gone.ma").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_existing_file() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([file_entry("a.ma", "/Projects")])).await;

    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .and(body_partial_json(json!({"path": "/Projects/a.ma"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {".tag": "file", "name": "a.ma"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    provider.delete_file("/Projects/a.ma").await.unwrap();
}

#[tokio::test]
async fn test_delete_non_empty_folder_requires_force() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "", json!([folder_entry("Projects", "")])).await;
    common::mount_listing(&server, "/Projects", json!([file_entry("a.ma", "/Projects")])).await;

    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .and(body_partial_json(json!({"path": "/Projects"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider.delete_folder("/Projects", false).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotEmpty(_)));

    provider.delete_folder("/Projects", true).await.unwrap();
}
