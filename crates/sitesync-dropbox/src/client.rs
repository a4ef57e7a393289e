//! Dropbox API v2 client
//!
//! Dropbox has three request styles:
//!
//! - RPC: JSON body in, JSON body out (`api.dropboxapi.com`)
//! - Content upload: arguments in the `Dropbox-API-Arg` header, raw bytes
//!   in the body, JSON out (`content.dropboxapi.com`)
//! - Content download: arguments in `Dropbox-API-Arg`, raw bytes out
//!
//! Route errors come back as HTTP 409 with an `error_summary` such as
//! `path/not_found/..`.
//!
//! ## Dropbox API References
//!
//! - [HTTP documentation](https://www.dropbox.com/developers/documentation/http/documentation)
//! - [Team files guide](https://developers.dropbox.com/dbx-team-files-guide)

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::DropboxError;

/// Base URL for RPC endpoints
pub const API_BASE_URL: &str = "https://api.dropboxapi.com/2";

/// Base URL for content upload and download endpoints
pub const CONTENT_BASE_URL: &str = "https://content.dropboxapi.com/2";

/// Page size for team listings
const TEAM_PAGE_SIZE: u32 = 100;

// ============================================================================
// API types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MemberList {
    members: Vec<MemberInfo>,
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct MemberInfo {
    profile: MemberProfile,
}

#[derive(Debug, Deserialize)]
struct MemberProfile {
    team_member_id: String,
    name: MemberName,
}

#[derive(Debug, Deserialize)]
struct MemberName {
    display_name: String,
}

/// A team member, `(display name, team member id)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub display_name: String,
    pub team_member_id: String,
}

#[derive(Debug, Deserialize)]
struct TeamFolderList {
    team_folders: Vec<TeamFolder>,
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

/// A team folder; its id is the namespace id used as path root
#[derive(Debug, Clone, Deserialize)]
pub struct TeamFolder {
    pub team_folder_id: String,
    pub name: String,
}

/// Entry of a folder listing
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    #[serde(rename = ".tag")]
    pub tag: String,
    pub name: String,
    pub path_display: Option<String>,
    pub size: Option<u64>,
}

impl Metadata {
    pub fn is_folder(&self) -> bool {
        self.tag == "folder"
    }
}

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<Metadata>,
    cursor: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct UploadSessionStart {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct RouteError {
    #[serde(default)]
    error_summary: String,
}

/// Conflict behavior of a committed upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Add,
    Overwrite,
}

impl WriteMode {
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            WriteMode::Overwrite
        } else {
            WriteMode::Add
        }
    }
}

/// Position inside an upload session
#[derive(Debug, Clone, Serialize)]
pub struct SessionCursor {
    pub session_id: String,
    pub offset: u64,
}

/// Dropbox addresses the namespace root as `""`, not `/`
pub fn api_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Serializes `value` for an HTTP header, escaping every non-ASCII char
pub fn header_safe_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Converts an error response into [`DropboxError::Api`]
async fn check(response: Response) -> Result<Response, DropboxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let summary = serde_json::from_str::<RouteError>(&body)
        .map(|e| e.error_summary)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    Err(DropboxError::Api {
        status: status.as_u16(),
        summary,
    })
}

// ============================================================================
// DropboxClient
// ============================================================================

/// HTTP client for Dropbox API calls
///
/// Team calls (`team/...`) use the bare token. User calls additionally send
/// the selected member and the path root once they are set with
/// [`DropboxClient::as_member`].
#[derive(Debug, Clone)]
pub struct DropboxClient {
    client: Client,
    token: String,
    api_base: String,
    content_base: String,
    member_id: Option<String>,
    namespace_id: Option<String>,
}

impl DropboxClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_urls(token, API_BASE_URL, CONTENT_BASE_URL)
    }

    /// Creates a client with custom base URLs (useful for testing)
    pub fn with_base_urls(
        token: impl Into<String>,
        api_base: impl Into<String>,
        content_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: api_base.into(),
            content_base: content_base.into(),
            member_id: None,
            namespace_id: None,
        }
    }

    /// Acts as `member_id` inside the team folder namespace `namespace_id`
    pub fn as_member(mut self, member_id: impl Into<String>, namespace_id: impl Into<String>) -> Self {
        self.member_id = Some(member_id.into());
        self.namespace_id = Some(namespace_id.into());
        self
    }

    pub fn member_id(&self) -> Option<&str> {
        self.member_id.as_deref()
    }

    fn post(&self, url: String) -> RequestBuilder {
        let mut builder = self.client.post(url).bearer_auth(&self.token);
        if let Some(member) = &self.member_id {
            builder = builder.header("Dropbox-API-Select-User", member);
        }
        if let Some(namespace) = &self.namespace_id {
            let root = json!({".tag": "namespace_id", "namespace_id": namespace});
            builder = builder.header("Dropbox-API-Path-Root", root.to_string());
        }
        builder
    }

    /// Calls an RPC route with a JSON argument
    pub async fn rpc<T: DeserializeOwned>(&self, route: &str, arg: &Value) -> Result<T, DropboxError> {
        debug!(route, "Dropbox RPC");
        let response = self
            .post(format!("{}/{}", self.api_base, route))
            .json(arg)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Calls a content upload route
    pub async fn upload<T: DeserializeOwned>(
        &self,
        route: &str,
        arg: &Value,
        data: Vec<u8>,
    ) -> Result<T, DropboxError> {
        debug!(route, bytes = data.len(), "Dropbox content upload");
        let response = self
            .post(format!("{}/{}", self.content_base, route))
            .header("Dropbox-API-Arg", header_safe_json(arg))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    // ------------------------------------------------------------------------
    // Team
    // ------------------------------------------------------------------------

    /// All members of the team, following cursors
    pub async fn team_members(&self) -> Result<Vec<TeamMember>, DropboxError> {
        let mut members = Vec::new();
        let mut page: MemberList = self
            .rpc("team/members/list_v2", &json!({ "limit": TEAM_PAGE_SIZE }))
            .await?;
        loop {
            members.extend(page.members.into_iter().map(|m| TeamMember {
                display_name: m.profile.name.display_name,
                team_member_id: m.profile.team_member_id,
            }));
            match (page.has_more, page.cursor) {
                (true, Some(cursor)) => {
                    page = self
                        .rpc("team/members/list/continue_v2", &json!({ "cursor": cursor }))
                        .await?;
                }
                _ => break,
            }
        }
        Ok(members)
    }

    /// All team folders, following cursors
    pub async fn team_folders(&self) -> Result<Vec<TeamFolder>, DropboxError> {
        let mut folders = Vec::new();
        let mut page: TeamFolderList = self
            .rpc("team/team_folder/list", &json!({ "limit": TEAM_PAGE_SIZE }))
            .await?;
        loop {
            folders.extend(page.team_folders);
            match (page.has_more, page.cursor) {
                (true, Some(cursor)) => {
                    page = self
                        .rpc("team/team_folder/list/continue", &json!({ "cursor": cursor }))
                        .await?;
                }
                _ => break,
            }
        }
        Ok(folders)
    }

    // ------------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------------

    /// Direct children of `path`, following cursors
    pub async fn list_folder(&self, path: &str) -> Result<Vec<Metadata>, DropboxError> {
        let mut entries = Vec::new();
        let mut page: ListFolderResult = self
            .rpc("files/list_folder", &json!({ "path": api_path(path) }))
            .await?;
        loop {
            entries.extend(page.entries);
            if !page.has_more {
                break;
            }
            page = self
                .rpc("files/list_folder/continue", &json!({ "cursor": page.cursor }))
                .await?;
        }
        Ok(entries)
    }

    pub async fn create_folder(&self, path: &str) -> Result<(), DropboxError> {
        let _: Value = self
            .rpc(
                "files/create_folder_v2",
                &json!({ "path": api_path(path), "autorename": false }),
            )
            .await?;
        Ok(())
    }

    /// Deletes a file or a folder with everything below it
    pub async fn delete(&self, path: &str) -> Result<(), DropboxError> {
        let _: Value = self
            .rpc("files/delete_v2", &json!({ "path": api_path(path) }))
            .await?;
        Ok(())
    }

    /// Uploads `data` to `path` in one request
    pub async fn upload_whole(&self, path: &str, data: Vec<u8>, mode: WriteMode) -> Result<(), DropboxError> {
        let arg = json!({ "path": api_path(path), "mode": mode, "autorename": false, "mute": true });
        let _: Value = self.upload("files/upload", &arg, data).await?;
        Ok(())
    }

    /// Opens an upload session with the first chunk
    pub async fn session_start(&self, data: Vec<u8>) -> Result<SessionCursor, DropboxError> {
        let offset = data.len() as u64;
        let started: UploadSessionStart = self
            .upload("files/upload_session/start", &json!({ "close": false }), data)
            .await?;
        Ok(SessionCursor {
            session_id: started.session_id,
            offset,
        })
    }

    /// Appends a chunk at `cursor.offset`
    pub async fn session_append(&self, cursor: &SessionCursor, data: Vec<u8>) -> Result<(), DropboxError> {
        let arg = json!({ "cursor": cursor, "close": false });
        let response = self
            .post(format!("{}/files/upload_session/append_v2", self.content_base))
            .header("Dropbox-API-Arg", header_safe_json(&arg))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        // append_v2 answers with an empty body
        check(response).await?;
        Ok(())
    }

    /// Sends the last chunk and commits the file to `path`
    pub async fn session_finish(
        &self,
        cursor: &SessionCursor,
        data: Vec<u8>,
        path: &str,
        mode: WriteMode,
    ) -> Result<(), DropboxError> {
        let arg = json!({
            "cursor": cursor,
            "commit": { "path": api_path(path), "mode": mode, "autorename": false, "mute": true },
        });
        let _: Value = self.upload("files/upload_session/finish", &arg, data).await?;
        Ok(())
    }

    /// Starts a download of `path`; the body is read by the caller
    pub async fn download(&self, path: &str) -> Result<Response, DropboxError> {
        let arg = json!({ "path": api_path(path) });
        let response = self
            .post(format!("{}/files/download", self.content_base))
            .header("Dropbox-API-Arg", header_safe_json(&arg))
            .send()
            .await?;
        check(response).await
    }
}
