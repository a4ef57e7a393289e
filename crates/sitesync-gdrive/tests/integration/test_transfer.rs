//! Integration tests for chunked uploads and downloads
//!
//! Covers the resumable upload protocol (308 then 200), ranged downloads,
//! overwrite gating and the mapping of 403/404 onto retry or failure.

use std::io::Write;
use std::time::{Duration, Instant};

use serde_json::json;
use sitesync_core::domain::{ProviderError, TransferOutcome};
use sitesync_core::ports::IRemoteProvider;
use sitesync_gdrive::{CHUNK_SIZE, QUOTA_BACKOFF};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, Recorder, PROJ_ID};

fn local_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content).unwrap();
    path
}

// ============================================================================
// Upload tests
// ============================================================================

#[tokio::test]
async fn test_upload_chunked_resumes_after_308() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(&server, "scene.ma", json!([])).await;
    common::mount_session_start(&server, 200, json!({})).await;

    let total = CHUNK_SIZE + CHUNK_SIZE / 2;
    Mock::given(method("PUT"))
        .and(path("/upload/session-1"))
        .and(header(
            "Content-Range",
            format!("bytes 0-{}/{}", CHUNK_SIZE - 1, total).as_str(),
        ))
        .respond_with(
            ResponseTemplate::new(308)
                .insert_header("Range", format!("bytes=0-{}", CHUNK_SIZE - 1).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session-1"))
        .and(header(
            "Content-Range",
            format!("bytes {}-{}/{}", CHUNK_SIZE, total - 1, total).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file-new"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", &vec![1u8; total]);
    let observer = Recorder::default();

    let outcome = provider
        .upload_file(&source, "/My Drive/proj", &observer, false)
        .await
        .unwrap();

    assert_eq!(outcome, TransferOutcome::Completed("file-new".into()));
    let reports = observer.reports();
    assert_eq!(reports.first(), Some(&0.0));
    assert_eq!(reports.last(), Some(&1.0));
}

#[tokio::test]
async fn test_upload_existing_without_overwrite_fails() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(
        &server,
        "scene.ma",
        json!([{"id": "file-old", "name": "scene.ma", "parents": [PROJ_ID]}]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"content");

    let err = provider
        .upload_file(&source, "/My Drive/proj/scene.ma", &Recorder::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_upload_overwrite_updates_existing_file() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(
        &server,
        "scene.ma",
        json!([{"id": "file-old", "name": "scene.ma", "parents": [PROJ_ID]}]),
    )
    .await;

    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/file-old"))
        .and(query_param("uploadType", "resumable"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/upload/session-1", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file-old"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"new content");

    let outcome = provider
        .upload_file(&source, "/My Drive/proj/scene.ma", &Recorder::default(), true)
        .await
        .unwrap();
    assert_eq!(outcome.value(), Some("file-old"));
}

#[tokio::test]
async fn test_upload_extensionless_existing_without_overwrite_fails() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(
        &server,
        "README",
        json!([{"id": "file-readme", "name": "README", "parents": [PROJ_ID]}]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "README", b"content");

    let err = provider
        .upload_file(&source, "/My Drive/proj", &Recorder::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::AlreadyExists(ref p) if p == "/My Drive/proj/README"));
}

#[tokio::test]
async fn test_upload_extensionless_overwrite_updates_existing_file() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(
        &server,
        "README",
        json!([{"id": "file-readme", "name": "README", "parents": [PROJ_ID]}]),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/file-readme"))
        .and(query_param("uploadType", "resumable"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/upload/session-1", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file-readme"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "README", b"new content");

    let outcome = provider
        .upload_file(&source, "/My Drive/proj", &Recorder::default(), true)
        .await
        .unwrap();
    assert_eq!(outcome.value(), Some("file-readme"));
}

#[tokio::test]
async fn test_upload_missing_source_fails() {
    let (_server, provider) = common::setup_gdrive_mock().await;

    let err = provider
        .upload_file(
            std::path::Path::new("/nonexistent/scene.ma"),
            "/My Drive/proj",
            &Recorder::default(),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_upload_into_unknown_folder_fails() {
    let (_server, provider) = common::setup_gdrive_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"content");

    let err = provider
        .upload_file(&source, "/My Drive/missing/scene.ma", &Recorder::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotADirectory(_)));
}

#[tokio::test]
async fn test_upload_404_retries_later() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(&server, "scene.ma", json!([])).await;
    common::mount_session_start(
        &server,
        404,
        common::api_error(404, "notFound", "File not found: f-proj."),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"content");

    let outcome = provider
        .upload_file(&source, "/My Drive/proj", &Recorder::default(), false)
        .await
        .unwrap();
    assert_eq!(outcome, TransferOutcome::RetryLater);
}

#[tokio::test]
async fn test_upload_without_consent_fails_immediately() {
    let (server, provider) = common::setup_gdrive_mock().await;
    let provider = provider.with_quota_backoff(Duration::from_secs(30));
    common::mount_find_file(&server, "scene.ma", json!([])).await;
    common::mount_session_start(
        &server,
        403,
        common::api_error(
            403,
            "appNotAuthorizedToFile",
            "The user has not granted the app 123 write access to the file f-proj.",
        ),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"content");

    let started = Instant::now();
    let err = provider
        .upload_file(&source, "/My Drive/proj", &Recorder::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::PermissionDenied(_)));
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_upload_quota_403_backs_off_then_retries_later() {
    assert_eq!(QUOTA_BACKOFF, Duration::from_secs(60));

    let (server, provider) = common::setup_gdrive_mock().await;
    let provider = provider.with_quota_backoff(Duration::from_millis(200));
    common::mount_find_file(&server, "scene.ma", json!([])).await;
    common::mount_session_start(
        &server,
        403,
        common::api_error(403, "userRateLimitExceeded", "User Rate Limit Exceeded"),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"content");

    let started = Instant::now();
    let outcome = provider
        .upload_file(&source, "/My Drive/proj", &Recorder::default(), false)
        .await
        .unwrap();
    assert_eq!(outcome, TransferOutcome::RetryLater);
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_upload_paused_before_first_chunk() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(&server, "scene.ma", json!([])).await;
    common::mount_session_start(&server, 200, json!({})).await;
    Mock::given(method("PUT"))
        .and(path("/upload/session-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "never"})))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = local_file(&dir, "scene.ma", b"content");

    let err = provider
        .upload_file(&source, "/My Drive/proj", &Recorder::cancelled(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Paused));
}

// ============================================================================
// Download tests
// ============================================================================

#[tokio::test]
async fn test_download_writes_ranges() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(
        &server,
        "plate.exr",
        json!([{"id": "file-1", "name": "plate.exr", "size": "10"}]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .and(query_param("alt", "media"))
        .and(header("Range", "bytes=0-9"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"0123456789".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let observer = Recorder::default();

    let outcome = provider
        .download_file("/My Drive/proj/plate.exr", dir.path(), &observer, false)
        .await
        .unwrap();

    assert_eq!(outcome, TransferOutcome::Completed("plate.exr".into()));
    let written = std::fs::read(dir.path().join("plate.exr")).unwrap();
    assert_eq!(written, b"0123456789");
    assert_eq!(observer.reports().last(), Some(&1.0));
}

#[tokio::test]
async fn test_download_extensionless_file() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(
        &server,
        "LUT",
        json!([{"id": "file-lut", "name": "LUT", "size": "3"}]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-lut"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"lut".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let outcome = provider
        .download_file("/My Drive/proj/LUT", dir.path(), &Recorder::default(), false)
        .await
        .unwrap();

    assert_eq!(outcome, TransferOutcome::Completed("LUT".into()));
    assert_eq!(std::fs::read(dir.path().join("LUT")).unwrap(), b"lut");
}

#[tokio::test]
async fn test_download_existing_without_overwrite_fails() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(
        &server,
        "plate.exr",
        json!([{"id": "file-1", "name": "plate.exr", "size": "10"}]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    local_file(&dir, "plate.exr", b"old");

    let err = provider
        .download_file("/My Drive/proj/plate.exr", dir.path(), &Recorder::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_download_missing_remote_fails() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(&server, "plate.exr", json!([])).await;

    let dir = tempfile::tempdir().unwrap();
    let err = provider
        .download_file("/My Drive/proj/plate.exr", dir.path(), &Recorder::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_download_paused_removes_partial_file() {
    let (server, provider) = common::setup_gdrive_mock().await;
    common::mount_find_file(
        &server,
        "plate.exr",
        json!([{"id": "file-1", "name": "plate.exr", "size": "10"}]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let err = provider
        .download_file("/My Drive/proj/plate.exr", dir.path(), &Recorder::cancelled(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Paused));
    assert!(!dir.path().join("plate.exr").exists());
}
