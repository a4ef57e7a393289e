//! Google Drive v3 REST client
//!
//! Provides a typed HTTP client for the parts of the Drive API the provider
//! needs: listing (with paging), root and shared drive lookup, folder
//! creation, deletion and the raw requests of chunked transfers.
//!
//! Every listing query excludes trashed items, and every call passes
//! `supportsAllDrives` so shared drives behave like My Drive.

use std::sync::Arc;

use reqwest::header::{HeaderMap, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use sitesync_core::domain::FolderRecord;
use tracing::debug;

use crate::auth::TokenSource;
use crate::GDriveError;

/// Base URL for Drive API v3 metadata calls
pub const API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Drive API v3 media uploads
pub const UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Page size for folder listings
const FOLDER_PAGE_SIZE: u32 = 1000;

/// Page size for shared drive listings
const DRIVE_PAGE_SIZE: u32 = 100;

// ============================================================================
// Drive API response types
// ============================================================================

/// A file or folder resource
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    pub mime_type: Option<String>,
    /// Drive reports sizes as decimal strings
    pub size: Option<String>,
}

impl DriveFile {
    pub fn size_bytes(&self) -> u64 {
        self.size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// A shared drive
#[derive(Debug, Clone, Deserialize)]
pub struct SharedDrive {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveList {
    #[serde(default)]
    drives: Vec<SharedDrive>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

/// State of a resumable upload after one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// 308: more bytes expected; carries the next offset the server wants
    Incomplete { next_offset: u64 },
    /// 200/201: upload finished; carries the file id
    Complete(String),
}

/// Appends the trashed filter to a listing query
pub fn handle_q(q: &str) -> String {
    let q = q.trim();
    if q.is_empty() {
        "trashed = false".to_string()
    } else {
        format!("{} and trashed = false", q)
    }
}

/// Escapes a value for use inside a single quoted query string
pub fn escape_q(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Converts an error response into [`GDriveError::Api`]
pub(crate) async fn check(response: Response) -> Result<Response, GDriveError> {
    let status = response.status();
    if status.is_success() || status == StatusCode::PERMANENT_REDIRECT {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

fn api_error(status: StatusCode, body: &str) -> GDriveError {
    let (reason, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (
            envelope.error.errors.into_iter().find_map(|d| d.reason),
            envelope.error.message,
        ),
        Err(_) => (None, body.trim().to_string()),
    };
    GDriveError::Api {
        status: status.as_u16(),
        reason,
        message: if message.is_empty() {
            status.to_string()
        } else {
            message
        },
    }
}

// ============================================================================
// GDriveClient
// ============================================================================

/// HTTP client for Drive API calls
///
/// Wraps `reqwest::Client` with bearer authentication and base URL
/// construction. Redirects are not followed: a resumable upload answers
/// intermediate chunks with `308`.
#[derive(Debug, Clone)]
pub struct GDriveClient {
    client: Client,
    api_base: String,
    upload_base: String,
    tokens: Arc<TokenSource>,
}

impl GDriveClient {
    pub fn new(tokens: TokenSource) -> Self {
        Self::with_base_urls(tokens, API_BASE_URL, UPLOAD_BASE_URL)
    }

    /// Creates a client with custom base URLs (useful for testing)
    pub fn with_base_urls(
        tokens: TokenSource,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_base: api_base.into(),
            upload_base: upload_base.into(),
            tokens: Arc::new(tokens),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Authenticated request against the metadata API
    pub async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, GDriveError> {
        let url = format!("{}{}", self.api_base, path);
        self.authorized(method, &url).await
    }

    /// Authenticated request against an absolute URL
    pub(crate) async fn authorized(
        &self,
        method: Method,
        url: &str,
    ) -> Result<RequestBuilder, GDriveError> {
        let token = self.tokens.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn list_page(
        &self,
        q: &str,
        fields: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<FileList, GDriveError> {
        let mut query: Vec<(&str, String)> = vec![
            ("q", q.to_string()),
            ("corpora", "allDrives".to_string()),
            ("includeItemsFromAllDrives", "true".to_string()),
            ("supportsAllDrives", "true".to_string()),
            ("fields", fields.to_string()),
        ];
        if let Some(size) = page_size {
            query.push(("pageSize", size.to_string()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .request(Method::GET, "/files")
            .await?
            .query(&query)
            .send()
            .await?;
        let list: FileList = check(response).await?.json().await?;
        Ok(list)
    }

    /// Lists every non-trashed file matching `q`, following page tokens
    pub async fn list_all(&self, q: &str, page_size: Option<u32>) -> Result<Vec<DriveFile>, GDriveError> {
        let q = handle_q(q);
        let fields = "nextPageToken, files(id, name, parents, mimeType, size)";
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_page(&q, fields, page_size, page_token.as_deref())
                .await?;
            debug!(count = page.files.len(), "Listed page of files");
            files.extend(page.files);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(files)
    }

    /// Lists all folders of all drives
    pub async fn list_folders(&self) -> Result<Vec<FolderRecord>, GDriveError> {
        let q = format!("mimeType='{}'", FOLDER_MIME_TYPE);
        let folders = self.list_all(&q, Some(FOLDER_PAGE_SIZE)).await?;
        Ok(folders
            .into_iter()
            .map(|f| FolderRecord {
                id: f.id,
                name: f.name,
                parents: f.parents,
            })
            .collect())
    }

    /// Direct children of `folder_id`
    pub async fn list_children(&self, folder_id: &str) -> Result<Vec<DriveFile>, GDriveError> {
        let q = format!("'{}' in parents", escape_q(folder_id));
        self.list_all(&q, Some(FOLDER_PAGE_SIZE)).await
    }

    /// True if `folder_id` has at least one child
    pub async fn has_children(&self, folder_id: &str) -> Result<bool, GDriveError> {
        let q = handle_q(&format!("'{}' in parents", escape_q(folder_id)));
        let page = self
            .list_page(&q, "nextPageToken, files(id, name, parents)", Some(1), None)
            .await?;
        Ok(!page.files.is_empty())
    }

    /// Looks up `name` directly inside `folder_id`
    ///
    /// # Errors
    /// More than one match is an [`GDriveError::InvalidResponse`].
    pub async fn find_file(&self, name: &str, folder_id: &str) -> Result<Option<DriveFile>, GDriveError> {
        let q = format!(
            "name = '{}' and '{}' in parents",
            escape_q(name),
            escape_q(folder_id)
        );
        let mut files = self.list_all(&q, None).await?;
        if files.len() > 1 {
            return Err(GDriveError::InvalidResponse(format!(
                "Too many files returned for {} in {}",
                name, folder_id
            )));
        }
        Ok(files.pop())
    }

    /// The My Drive root folder
    pub async fn get_root(&self) -> Result<DriveFile, GDriveError> {
        let response = self
            .request(Method::GET, "/files/root")
            .await?
            .query(&[("fields", "id, name"), ("supportsAllDrives", "true")])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// All shared drives visible to the account
    pub async fn list_drives(&self) -> Result<Vec<SharedDrive>, GDriveError> {
        let mut drives = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", DRIVE_PAGE_SIZE.to_string())];
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.clone()));
            }
            let response = self
                .request(Method::GET, "/drives")
                .await?
                .query(&query)
                .send()
                .await?;
            let page: DriveList = check(response).await?.json().await?;
            drives.extend(page.drives);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(drives)
    }

    /// Creates a folder named `name` inside `parent_id`, returns its id
    pub async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String, GDriveError> {
        debug!(name, parent_id, "Creating folder");
        let response = self
            .request(Method::POST, "/files")
            .await?
            .query(&[("supportsAllDrives", "true"), ("fields", "id")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }))
            .send()
            .await?;
        let created: DriveFile = check(response).await?.json().await?;
        Ok(created.id)
    }

    /// Deletes a file or folder (with everything below it)
    pub async fn delete(&self, id: &str) -> Result<(), GDriveError> {
        debug!(id, "Deleting item");
        let response = self
            .request(Method::DELETE, &format!("/files/{}", id))
            .await?
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transfer primitives
    // ------------------------------------------------------------------------

    /// Opens a resumable upload session and returns its URL
    ///
    /// Creates a new file in `parent_id` when `existing_id` is `None`,
    /// otherwise replaces the content of `existing_id`.
    pub async fn start_resumable(
        &self,
        name: &str,
        parent_id: &str,
        existing_id: Option<&str>,
        size: u64,
    ) -> Result<String, GDriveError> {
        let (method, url, body) = match existing_id {
            // update doesn't accept parents
            Some(id) => (
                Method::PATCH,
                format!("{}/files/{}", self.upload_base, id),
                json!({ "name": name }),
            ),
            None => (
                Method::POST,
                format!("{}/files", self.upload_base),
                json!({ "name": name, "parents": [parent_id] }),
            ),
        };

        let response = self
            .authorized(method, &url)
            .await?
            .query(&[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", "id"),
            ])
            .header("X-Upload-Content-Type", "application/octet-stream")
            .header("X-Upload-Content-Length", size.to_string())
            .json(&body)
            .send()
            .await?;
        let response = check(response).await?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                GDriveError::InvalidResponse("resumable session without Location header".into())
            })
    }

    /// Sends bytes `offset..offset + data.len()` of a `total` byte upload
    pub async fn upload_chunk(
        &self,
        session_url: &str,
        data: Vec<u8>,
        offset: u64,
        total: u64,
    ) -> Result<ChunkStatus, GDriveError> {
        let content_range = if data.is_empty() {
            format!("bytes */{}", total)
        } else {
            format!("bytes {}-{}/{}", offset, offset + data.len() as u64 - 1, total)
        };
        debug!("Uploading chunk: {}", content_range);

        let response = self
            .authorized(Method::PUT, session_url)
            .await?
            .header(CONTENT_RANGE, content_range)
            .body(data)
            .send()
            .await?;
        let response = check(response).await?;

        if response.status() == StatusCode::PERMANENT_REDIRECT {
            let next_offset = next_offset(response.headers());
            return Ok(ChunkStatus::Incomplete { next_offset });
        }

        let file: DriveFile = response.json().await?;
        Ok(ChunkStatus::Complete(file.id))
    }

    /// Fetches bytes `start..=end` of file `id`
    pub async fn download_range(&self, id: &str, start: u64, end: u64) -> Result<Vec<u8>, GDriveError> {
        let response = self
            .request(Method::GET, &format!("/files/{}", id))
            .await?
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await?;
        let bytes = check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Offset following the `Range: bytes=0-N` header of a 308, 0 without one
fn next_offset(headers: &HeaderMap) -> u64 {
    headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('-').next())
        .and_then(|last| last.trim().parse::<u64>().ok())
        .map(|last| last + 1)
        .unwrap_or(0)
}
