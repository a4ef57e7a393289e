//! Integration tests for root discovery and folder tree operations

use serde_json::json;
use sitesync_core::domain::ProviderError;
use sitesync_core::ports::IRemoteProvider;
use wiremock::matchers::{body_partial_json, method, path, query_param, query_param_contains};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, ASSETS_ID, PROJ_ID, ROOT_ID};

#[tokio::test]
async fn test_get_tree_builds_from_listing() {
    let (_server, provider) = common::setup_gdrive_mock().await;

    let tree = provider.get_tree().await.unwrap().expect("gdrive has a tree");

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.id_of("/My Drive"), Some(ROOT_ID));
    assert_eq!(tree.id_of("/My Drive/proj"), Some(PROJ_ID));
    assert_eq!(tree.id_of("/My Drive/proj/assets/"), Some(ASSETS_ID));
}

#[tokio::test]
async fn test_root_folders_include_matching_shared_drives() {
    let server = wiremock::MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": ROOT_ID})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/drives"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "drives": [
                {"id": "sd-1", "name": "Studio Shared"},
                {"id": "sd-2", "name": "Accounting"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let presets = sitesync_core::config::SitePresets::new("gdrive")
        .with_root(sitesync_core::domain::RootConfig::single("/Studio Shared"));
    let args = sitesync_core::ports::ProviderArgs::new("proj", "gdrive").with_presets(Some(presets));
    let provider = sitesync_gdrive::GDriveProvider::with_client(args, common::client_for(&server));

    let roots = provider.root_folders().await.unwrap();
    let names: Vec<&str> = roots.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Studio Shared", "My Drive"]);

    // cached after the first call
    provider.root_folders().await.unwrap();
}

#[tokio::test]
async fn test_wrong_root_definition_is_rejected() {
    let server = wiremock::MockServer::start().await;
    let presets = sitesync_core::config::SitePresets::new("gdrive")
        .with_root(sitesync_core::domain::RootConfig::single("Studio"));
    let args = sitesync_core::ports::ProviderArgs::new("proj", "gdrive").with_presets(Some(presets));
    let provider = sitesync_gdrive::GDriveProvider::with_client(args, common::client_for(&server));

    let err = provider.root_folders().await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_create_existing_folder_makes_no_call() {
    let (server, provider) = common::setup_gdrive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "unexpected"})))
        .expect(0)
        .mount(&server)
        .await;

    let id = provider.create_folder("/My Drive/proj/assets/").await.unwrap();
    assert_eq!(id, ASSETS_ID);
}

#[tokio::test]
async fn test_create_folder_is_idempotent() {
    let (server, provider) = common::setup_gdrive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_partial_json(json!({"name": "renders", "parents": [PROJ_ID]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f-renders"})))
        .expect(1)
        .mount(&server)
        .await;

    let first = provider.create_folder("/My Drive/proj/renders").await.unwrap();
    let second = provider.create_folder("/My Drive/proj/renders").await.unwrap();

    assert_eq!(first, "f-renders");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_create_nested_folders() {
    let (server, provider) = common::setup_gdrive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_partial_json(json!({"name": "shots", "parents": [PROJ_ID]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f-shots"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_partial_json(json!({"name": "sh010", "parents": ["f-shots"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f-sh010"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = provider.create_folder("/My Drive/proj/shots/sh010").await.unwrap();
    assert_eq!(id, "f-sh010");

    let tree = provider.get_tree().await.unwrap().unwrap();
    assert_eq!(tree.id_of("/My Drive/proj/shots"), Some("f-shots"));
}

#[tokio::test]
async fn test_create_folder_outside_roots_fails() {
    let (_server, provider) = common::setup_gdrive_mock().await;

    let err = provider.create_folder("/Elsewhere/x").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotADirectory(_)));
}

#[tokio::test]
async fn test_list_folder_returns_names() {
    let (server, provider) = common::setup_gdrive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param_contains("q", format!("'{}' in parents", PROJ_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"id": ASSETS_ID, "name": "assets"},
                {"id": "file-1", "name": "scene.ma"}
            ]
        })))
        .mount(&server)
        .await;

    let names = provider.list_folder("/My Drive/proj").await.unwrap();
    assert_eq!(names, vec!["assets", "scene.ma"]);

    let err = provider.list_folder("/My Drive/missing").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_non_empty_folder_requires_force() {
    let (server, provider) = common::setup_gdrive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageSize", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"id": ASSETS_ID, "name": "assets"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/drive/v3/files/{}", PROJ_ID)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider.delete_folder("/My Drive/proj", false).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotEmpty(_)));

    provider.delete_folder("/My Drive/proj", true).await.unwrap();

    let tree = provider.get_tree().await.unwrap().unwrap();
    assert!(!tree.contains("/My Drive/proj"));
    assert!(!tree.contains("/My Drive/proj/assets"));
    assert!(tree.contains("/My Drive"));
}

#[tokio::test]
async fn test_delete_missing_file_is_not_found() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(&server, "gone.ma", json!([])).await;

    let err = provider.delete_file("/My Drive/proj/gone.ma").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}
