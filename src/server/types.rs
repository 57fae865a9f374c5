//! Request/response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

/// `200` body of `POST /convert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub download_url: String,
}

/// Body of every `4xx`/`5xx` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Multipart field names accepted by `POST /convert`.
pub mod fields {
    pub const FILE: &str = "file";
    pub const FROM_FORMAT: &str = "fromFormat";
    pub const TO_FORMAT: &str = "toFormat";
}
