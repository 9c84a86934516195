//! Link clicks the supervisor script takes away from the page: downloads are
//! saved through a native dialog, foreign links open in the system browser.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tauri::Url;

pub const FALLBACK_FILE_NAME: &str = "download";

/// Outcome reported back to the page. A cancelled dialog is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFileResult {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub canceled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveFileResult {
    pub fn saved(path: String) -> Self {
        Self {
            success: true,
            file_path: Some(path),
            ..Default::default()
        }
    }

    pub fn canceled() -> Self {
        Self {
            canceled: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

/// A file the page asked to save, decoded from the script's base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SaveRequest {
    pub fn decode(data: &str, file_name: &str, mime_type: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(data.trim())
            .context("download payload is not valid base64")?;
        Ok(Self {
            file_name: sanitize_file_name(file_name),
            mime_type: mime_type.trim().to_string(),
            bytes,
        })
    }

    /// Dialog filter derived from the file extension, e.g. `("MP3", ["mp3"])`.
    pub fn filter(&self) -> Option<(String, Vec<String>)> {
        let (stem, extension) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || extension.is_empty() {
            return None;
        }
        Some((
            extension.to_ascii_uppercase(),
            vec![extension.to_ascii_lowercase()],
        ))
    }
}

/// Keep only the final path component and drop characters no desktop file
/// system accepts.
pub fn sanitize_file_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    if cleaned.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

/// Only web and mail links leave the shell; anything else (`file:`,
/// `javascript:`, custom schemes) is refused.
pub fn external_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https" | "mailto").then_some(url)
}
