//! Google Drive API client for uploads and folder listing.

use std::path::Path;

use reqwest::{Body, Client, Response};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::config::Config;
use crate::error::{DriveError, Result};
use crate::models::{
    ApiErrorResponse, FolderEntry, FolderListResponse, UploadMetadata, UploadResult,
    FOLDER_MIME_TYPE,
};
use crate::token_store::StoredToken;

/// Folders returned by a single listing.
pub const FOLDER_PAGE_SIZE: u32 = 10;

const UPLOAD_FIELDS: &str = "id, name, webViewLink";

/// Client bound to a single access token.
pub struct DriveClient {
    access_token: String,
    api_base: String,
    upload_base: String,
    http: Client,
}

impl DriveClient {
    /// Create a client that authenticates every request with `credential`.
    pub fn new(config: &Config, credential: &StoredToken) -> Self {
        Self {
            access_token: credential.access_token.clone(),
            api_base: config.api_base.clone(),
            upload_base: config.upload_base.clone(),
            http: Client::new(),
        }
    }

    /// Upload a file, optionally into a folder.
    ///
    /// The file is sent through a resumable upload session and streamed from
    /// disk rather than read into memory.
    ///
    /// # Arguments
    /// * `local_path` - Path to the local file
    /// * `folder_id` - ID of the destination folder, or `None` for My Drive
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        local_path: P,
        folder_id: Option<&str>,
    ) -> Result<UploadResult> {
        let local_path = local_path.as_ref();
        if !local_path.is_file() {
            return Err(DriveError::FileNotFound(local_path.display().to_string()));
        }
        // Non-UTF-8 names are sent with replacement characters.
        let filename = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DriveError::FileNotFound(local_path.display().to_string()))?;

        let file = File::open(local_path).await?;
        let file_size = file.metadata().await?.len();
        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();

        let metadata = UploadMetadata {
            name: &filename,
            parents: folder_id.into_iter().collect(),
        };
        let session_url = self
            .start_upload_session(&metadata, &mime_type, file_size)
            .await?;
        tracing::debug!(%session_url, file_size, "upload session created");

        let response = self
            .http
            .put(&session_url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", &mime_type)
            .header("Content-Length", file_size.to_string())
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Initiate a resumable upload and return the session URI.
    async fn start_upload_session(
        &self,
        metadata: &UploadMetadata<'_>,
        mime_type: &str,
        file_size: u64,
    ) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "resumable"), ("fields", UPLOAD_FIELDS)])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(metadata)
            .send()
            .await?;

        let response = check_status(response).await?;

        response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::Api {
                status: response.status().as_u16(),
                message: "No upload URL in response".to_string(),
            })
    }

    /// List the first page of folders visible to the app.
    pub async fn list_folders(&self) -> Result<Vec<FolderEntry>> {
        let query = format!("mimeType='{}'", FOLDER_MIME_TYPE);
        let page_size = FOLDER_PAGE_SIZE.to_string();

        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query.as_str()),
                ("pageSize", page_size.as_str()),
                ("fields", "files(id, name)"),
            ])
            .send()
            .await?;

        let response = check_status(response).await?;
        let list: FolderListResponse = response.json().await?;
        Ok(list.files)
    }
}

/// Turn a non-success response into an [`DriveError::Api`].
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::Api {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::Api {
        status: status.as_u16(),
        message: error_body,
    })
}
