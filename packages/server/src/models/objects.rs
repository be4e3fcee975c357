use chrono::{DateTime, Utc};
use media::UploadReceipt;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Largest number of references accepted by the resolve and purge endpoints.
pub const MAX_REFERENCES: usize = 1000;

/// Request body for reserving an upload.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UploadParamsRequest {
    /// Original filename; its extension becomes part of the object name.
    #[schema(example = "summer-sale.jpg")]
    pub filename: Option<String>,
}

/// Where and under which name to upload.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadParamsResponse {
    /// Reserved object name. A bare token when the extension is not yet known.
    #[schema(example = "0f8fad5bd9cb469fa16570867728950e.jpg")]
    pub object_name: String,
    /// Canonical URL the object will be served from, once the extension is known.
    pub url: Option<String>,
    /// Where to `PUT` the bytes.
    #[serde(rename = "uploadURL")]
    #[schema(example = "/api/v1/objects/direct-upload/0f8fad5bd9cb469fa16570867728950e.jpg")]
    pub upload_url: String,
}

/// Response to a direct upload.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectUploadResponse {
    pub success: bool,
    pub object_name: String,
    /// Canonical serving URL.
    pub url: String,
    /// Canonical serving path, always relative.
    #[schema(example = "/objects/0f8fad5bd9cb469fa16570867728950e.jpg")]
    pub location: String,
}

/// Response to a multipart upload.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub object_name: String,
    pub url: String,
    pub path: String,
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl UploadResponse {
    pub fn new(receipt: UploadReceipt, url: String) -> Self {
        Self {
            object_name: receipt.object_name.to_string(),
            url,
            path: receipt.canonical_path,
            size: receipt.size,
            content_type: receipt.content_type,
            created_at: receipt.created_at,
        }
    }
}

/// A batch of stored image references.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReferencesRequest {
    /// References in any historical shape: absolute URLs, canonical paths,
    /// bare identifiers or legacy direct-upload URLs.
    pub references: Vec<String>,
}

pub fn validate_references(payload: &ReferencesRequest) -> Result<(), AppError> {
    if payload.references.len() > MAX_REFERENCES {
        return Err(AppError::Validation(format!(
            "At most {MAX_REFERENCES} references per request"
        )));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ResolvedReference {
    pub reference: String,
    /// Canonical form, or null for blank input.
    pub resolved: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ResolveResponse {
    pub resolved: Vec<ResolvedReference>,
}

/// Outcome of a best-effort purge.
#[derive(Serialize, Default, utoipa::ToSchema)]
pub struct PurgeResponse {
    /// Object names that were deleted.
    pub removed: Vec<String>,
    /// Local references whose object did not exist.
    pub missing: Vec<String>,
    /// References that do not point at a local object.
    pub skipped: Vec<String>,
    /// Object names whose deletion failed.
    pub failed: Vec<String>,
}
