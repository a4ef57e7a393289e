//! Integration tests for uploads (single request and session) and
//! streamed downloads

use std::io::Write;

use serde_json::json;
use sitesync_core::domain::{ProviderError, TransferOutcome};
use sitesync_core::ports::IRemoteProvider;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, file_entry, Recorder};

fn local_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content).unwrap();
    path
}

fn arg_of(request: &wiremock::Request) -> serde_json::Value {
    let raw = request.headers.get("Dropbox-API-Arg").unwrap().to_str().unwrap();
    serde_json::from_str(raw).unwrap()
}

// ============================================================================
// Upload tests
// ============================================================================

#[tokio::test]
async fn test_small_upload_is_single_request() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([])).await;

    Mock::given(method("POST"))
        .and(path("/content/2/files/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "scene.ma", "path_display": "/Projects/scene.ma", "size": 7
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"content");
    let observer = Recorder::default();

    let outcome = provider
        .upload_file(&source, "/Projects", &observer, false)
        .await
        .unwrap();
    assert_eq!(outcome, TransferOutcome::Completed("/Projects/scene.ma".into()));
    assert_eq!(observer.reports(), vec![0.0, 1.0]);

    let requests = server.received_requests().await.unwrap();
    let upload = requests
        .iter()
        .find(|r| r.url.path() == "/content/2/files/upload")
        .unwrap();
    let arg = arg_of(upload);
    assert_eq!(arg["path"], "/Projects/scene.ma");
    assert_eq!(arg["mode"], "add");
    assert_eq!(upload.body, b"content");
}

#[tokio::test]
async fn test_large_upload_uses_session() {
    let (server, provider) = common::setup_dropbox_mock().await;
    let provider = provider.with_chunk_size(4);
    common::mount_listing(&server, "/Projects", json!([file_entry("scene.ma", "/Projects")])).await;

    Mock::given(method("POST"))
        .and(path("/content/2/files/upload_session/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "s-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/content/2/files/upload_session/append_v2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/content/2/files/upload_session/finish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "scene.ma", "path_display": "/Projects/scene.ma", "size": 10
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"0123456789");

    let outcome = provider
        .upload_file(&source, "/Projects/scene.ma", &Recorder::default(), true)
        .await
        .unwrap();
    assert!(outcome.is_completed());

    let requests = server.received_requests().await.unwrap();
    let append = requests
        .iter()
        .find(|r| r.url.path().ends_with("append_v2"))
        .unwrap();
    assert_eq!(arg_of(append)["cursor"]["offset"], 4);
    assert_eq!(append.body, b"4567");

    let finish = requests
        .iter()
        .find(|r| r.url.path().ends_with("finish"))
        .unwrap();
    let arg = arg_of(finish);
    assert_eq!(arg["cursor"]["session_id"], "s-1");
    assert_eq!(arg["cursor"]["offset"], 8);
    assert_eq!(arg["commit"]["mode"], "overwrite");
    assert_eq!(finish.body, b"89");
}

#[tokio::test]
async fn test_upload_existing_without_overwrite_fails() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([file_entry("scene.ma", "/Projects")])).await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"content");

    let err = provider
        .upload_file(&source, "/Projects/scene.ma", &Recorder::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_rate_limited_upload_retries_later() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([])).await;

    Mock::given(method("POST"))
        .and(path("/content/2/files/upload"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error_summary": "too_many_requests/..",
            "error": {"reason": {".tag": "too_many_requests"}, "retry_after": 1}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"content");

    let outcome = provider
        .upload_file(&source, "/Projects", &Recorder::default(), false)
        .await
        .unwrap();
    assert_eq!(outcome, TransferOutcome::RetryLater);
}

// ============================================================================
// Download tests
// ============================================================================

async fn mount_download(server: &wiremock::MockServer, content: &[u8]) {
    Mock::given(method("POST"))
        .and(path("/content/2/files/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Dropbox-API-Result", r#"{"name": "plate.exr", "size": 10}"#)
                .set_body_bytes(content.to_vec()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_download_streams_to_disk() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([file_entry("plate.exr", "/Projects")])).await;
    mount_download(&server, b"0123456789").await;

    let dir = tempfile::tempdir().unwrap();
    let observer = Recorder::default();

    let outcome = provider
        .download_file("/Projects/plate.exr", dir.path(), &observer, false)
        .await
        .unwrap();

    assert_eq!(outcome, TransferOutcome::Completed("plate.exr".into()));
    assert_eq!(std::fs::read(dir.path().join("plate.exr")).unwrap(), b"0123456789");
    assert_eq!(observer.reports().last(), Some(&1.0));
}

#[tokio::test]
async fn test_download_to_renamed_target_reports_local_name() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([file_entry("plate.exr", "/Projects")])).await;
    mount_download(&server, b"0123456789").await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("plate_v002.exr");

    let outcome = provider
        .download_file("/Projects/plate.exr", &target, &Recorder::default(), false)
        .await
        .unwrap();

    assert_eq!(outcome, TransferOutcome::Completed("plate_v002.exr".into()));
    assert_eq!(std::fs::read(&target).unwrap(), b"0123456789");
}

#[tokio::test]
async fn test_download_overwrite_replaces_existing() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([file_entry("plate.exr", "/Projects")])).await;
    mount_download(&server, b"0123456789").await;

    let dir = tempfile::tempdir().unwrap();
    let existing = local_file(&dir, "plate.exr", b"old content that is longer");

    let err = provider
        .download_file("/Projects/plate.exr", &existing, &Recorder::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::AlreadyExists(_)));

    provider
        .download_file("/Projects/plate.exr", &existing, &Recorder::default(), true)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&existing).unwrap(), b"0123456789");
}

#[tokio::test]
async fn test_download_missing_remote_is_not_found() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([])).await;

    let dir = tempfile::tempdir().unwrap();
    let err = provider
        .download_file("/Projects/plate.exr", dir.path(), &Recorder::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_paused_download_removes_partial_file() {
    let (server, provider) = common::setup_dropbox_mock().await;
    common::mount_listing(&server, "/Projects", json!([file_entry("plate.exr", "/Projects")])).await;
    mount_download(&server, b"0123456789").await;

    let dir = tempfile::tempdir().unwrap();
    let err = provider
        .download_file("/Projects/plate.exr", dir.path(), &Recorder::cancelled(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Paused));
    assert!(!dir.path().join("plate.exr").exists());
}
