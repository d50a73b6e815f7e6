//! Folder ID extraction for the `--folder-id` argument.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{DriveError, Result};

static FOLDER_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)")
        .expect("Invalid folder URL regex")
});

static OPEN_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)")
        .expect("Invalid open URL regex")
});

/// Valid Google Drive ID pattern (alphanumeric, underscore, hyphen).
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Accept a raw folder ID or a folder URL copied from the browser.
///
/// Supported forms:
/// - `https://drive.google.com/drive/folders/<ID>`
/// - `https://drive.google.com/drive/u/0/folders/<ID>`
/// - `https://drive.google.com/open?id=<ID>`
/// - Raw ID string
///
/// # Examples
///
/// ```
/// use drive_upload::folder_ref::parse_folder_id;
///
/// let id = parse_folder_id("https://drive.google.com/drive/folders/1abc123?usp=sharing").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = parse_folder_id("1abc123").unwrap();
/// assert_eq!(id, "1abc123");
/// ```
pub fn parse_folder_id(input: &str) -> Result<String> {
    let trimmed = input.trim();

    let from_url = [&*FOLDER_URL_REGEX, &*OPEN_URL_REGEX]
        .into_iter()
        .find_map(|re| re.captures(trimmed))
        .and_then(|captures| captures.get(1));
    if let Some(id) = from_url {
        return Ok(id.as_str().to_string());
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidFolderId(input.to_string()))
}
