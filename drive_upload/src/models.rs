//! Data models for Google Drive API requests and responses.

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Metadata sent when creating a file.
#[derive(Debug, Serialize)]
pub struct UploadMetadata<'a> {
    pub name: &'a str,
    pub parents: Vec<&'a str>,
}

/// Fields returned for a newly created file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub web_view_link: Option<String>,
}

/// A Drive folder as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
}

impl std::fmt::Display for FolderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (ID: {})", self.name, self.id)
    }
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
pub struct FolderListResponse {
    #[serde(default)]
    pub files: Vec<FolderEntry>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}
