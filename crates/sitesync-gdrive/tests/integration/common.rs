//! Shared test helpers for Drive API integration tests
//!
//! Each helper mounts the necessary mock endpoints and returns a configured
//! client or provider pointing at the mock server. The metadata API lives
//! under `/drive/v3`, uploads under `/upload/drive/v3`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitesync_core::config::SitePresets;
use sitesync_core::domain::RootConfig;
use sitesync_core::ports::{ITransferObserver, ProviderArgs};
use sitesync_gdrive::auth::TokenSource;
use sitesync_gdrive::client::GDriveClient;
use sitesync_gdrive::GDriveProvider;

pub const ROOT_ID: &str = "root-id";
pub const PROJ_ID: &str = "f-proj";
pub const ASSETS_ID: &str = "f-assets";

/// Client with a static token against `server`
pub fn client_for(server: &MockServer) -> GDriveClient {
    GDriveClient::with_base_urls(
        TokenSource::Static("test-access-token".into()),
        format!("{}/drive/v3", server.uri()),
        format!("{}/upload/drive/v3", server.uri()),
    )
}

/// Sets up a mock server with My Drive and two folders:
///
/// - `/My Drive` → `root-id`
/// - `/My Drive/proj` → `f-proj`
/// - `/My Drive/proj/assets` → `f-assets`
pub async fn setup_gdrive_mock() -> (MockServer, GDriveProvider) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": ROOT_ID,
            "name": "My Drive"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param_contains("q", "mimeType='application/vnd.google-apps.folder'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"id": ASSETS_ID, "name": "assets", "parents": [PROJ_ID],
                 "mimeType": "application/vnd.google-apps.folder"},
                {"id": PROJ_ID, "name": "proj", "parents": [ROOT_ID],
                 "mimeType": "application/vnd.google-apps.folder"}
            ]
        })))
        .mount(&server)
        .await;

    let presets = SitePresets::new("gdrive").with_root(RootConfig::single("/My Drive"));
    let args = ProviderArgs::new("test_project", "gdrive").with_presets(Some(presets));
    let provider = GDriveProvider::with_client(args, client_for(&server));

    (server, provider)
}

/// Mounts the lookup of `name` inside any folder
pub async fn mount_find_file(server: &MockServer, name: &str, files: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param_contains("q", format!("name = '{}'", name)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(server)
        .await;
}

/// Mounts the resumable session start, answering with `status`
pub async fn mount_session_start(server: &MockServer, status: u16, body: serde_json::Value) {
    let template = if status == 200 {
        ResponseTemplate::new(200)
            .insert_header("Location", format!("{}/upload/session-1", server.uri()).as_str())
    } else {
        ResponseTemplate::new(status).set_body_json(body)
    };
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param_contains("uploadType", "resumable"))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Google error envelope
pub fn api_error(code: u16, reason: &str, message: &str) -> serde_json::Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{"reason": reason, "message": message}]
        }
    })
}

/// Observer recording every reported fraction
#[derive(Default)]
pub struct Recorder {
    pub reports: Mutex<Vec<f64>>,
    pub cancelled: AtomicBool,
}

impl Recorder {
    pub fn cancelled() -> Self {
        let recorder = Self::default();
        recorder.cancelled.store(true, Ordering::SeqCst);
        recorder
    }

    pub fn reports(&self) -> Vec<f64> {
        self.reports.lock().unwrap().clone()
    }
}

impl ITransferObserver for Recorder {
    fn report_progress(&self, fraction: f64) {
        self.reports.lock().unwrap().push(fraction);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn progress_interval(&self) -> Duration {
        Duration::ZERO
    }
}
