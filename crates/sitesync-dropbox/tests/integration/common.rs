//! Shared test helpers for Dropbox API integration tests
//!
//! RPC routes are served under `/2`, content routes under `/content/2`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitesync_core::config::SitePresets;
use sitesync_core::domain::RootConfig;
use sitesync_core::ports::{ITransferObserver, ProviderArgs};
use sitesync_dropbox::client::DropboxClient;
use sitesync_dropbox::DropboxProvider;

pub const MEMBER_ID: &str = "dbmid:jane";
pub const NAMESPACE_ID: &str = "1234567";

pub fn team_client(server: &MockServer) -> DropboxClient {
    DropboxClient::with_base_urls(
        "team-token",
        format!("{}/2", server.uri()),
        format!("{}/content/2", server.uri()),
    )
}

pub fn presets(member: &str, team_folder: &str) -> SitePresets {
    SitePresets::new("dropbox")
        .with_root(RootConfig::single("/Projects"))
        .with_setting("token", "team-token")
        .with_setting("team_folder_name", team_folder)
        .with_setting("acting_as_member", member)
}

/// Mounts a team with members "Jane Doe" and "John Roe" and the team
/// folders "Studio" and "Archive"
pub async fn mount_team(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/2/team/members/list_v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [
                {"profile": {"team_member_id": "dbmid:john", "name": {"display_name": "John Roe"}}},
                {"profile": {"team_member_id": MEMBER_ID, "name": {"display_name": "Jane Doe"}}}
            ],
            "cursor": "m1",
            "has_more": false
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2/team/team_folder/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "team_folders": [
                {"team_folder_id": "999", "name": "Archive", "status": {".tag": "active"}},
                {"team_folder_id": NAMESPACE_ID, "name": "Studio", "status": {".tag": "active"}}
            ],
            "cursor": "t1",
            "has_more": false
        })))
        .mount(server)
        .await;
}

/// Mock server with the team mounted and an active provider acting as
/// "Jane Doe" inside "Studio"
pub async fn setup_dropbox_mock() -> (MockServer, DropboxProvider) {
    let server = MockServer::start().await;
    mount_team(&server).await;

    let args = ProviderArgs::new("test_project", "dropbox")
        .with_presets(Some(presets("Jane Doe", "Studio")));
    let provider = DropboxProvider::with_client(args, team_client(&server)).await;

    (server, provider)
}

/// Mounts a single page listing of `folder` (`""` for the namespace root)
pub async fn mount_listing(server: &MockServer, folder: &str, entries: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(body_partial_json(json!({ "path": folder })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": entries,
            "cursor": "cursor-end",
            "has_more": false
        })))
        .mount(server)
        .await;
}

pub fn file_entry(name: &str, parent: &str) -> serde_json::Value {
    json!({".tag": "file", "name": name, "path_display": format!("{}/{}", parent, name), "size": 10})
}

pub fn folder_entry(name: &str, parent: &str) -> serde_json::Value {
    json!({".tag": "folder", "name": name, "path_display": format!("{}/{}", parent, name)})
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
