//! Contract with the conversion server
//!
//! Only the response envelope is modelled here. Operation-specific fields
//! are ignored.

use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};

const GENERIC_FAILURE: &str = "Operation failed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where to fetch a finished artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    pub file_name: String,
}

impl ProcessingResponse {
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn into_result(self) -> Result<DownloadTarget> {
        if !self.success {
            return Err(RuntimeError::ExternalService(
                self.error.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            ));
        }
        let url = self.download_url.ok_or_else(|| {
            RuntimeError::ExternalService("Response has no download URL".to_string())
        })?;
        let file_name = match self.file_name {
            Some(name) => name,
            None => url.rsplit('/').next().unwrap_or_default().to_string(),
        };
        Ok(DownloadTarget { url, file_name })
    }
}

/// MIME type served for a downloaded artifact, chosen by extension
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
