use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::Json;
use bytes::BytesMut;
use media::identifier::parse_token;
use media::{ObjectId, StorageError, UploadRequest};
use tracing::{instrument, warn};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AdminSession;
use crate::extractors::json::AppJson;
use crate::models::objects::{
    DirectUploadResponse, PurgeResponse, ReferencesRequest, ResolveResponse, ResolvedReference,
    UploadParamsRequest, UploadParamsResponse, UploadResponse, validate_references,
};
use crate::state::AppState;
use crate::utils::filename::optional_filename;

/// Header carrying the original filename of a direct upload.
pub const FILE_NAME_HEADER: &str = "x-file-name";

const DIRECT_UPLOAD_PATH: &str = "/api/v1/objects/direct-upload";

/// Multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn upload_body_limit(max_upload_bytes: u64) -> DefaultBodyLimit {
    let limit = usize::try_from(max_upload_bytes).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(limit.saturating_add(MULTIPART_OVERHEAD))
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Objects",
    operation_id = "createUploadParams",
    summary = "Reserve an object name for a direct upload",
    description = "Returns the object name and the URL to `PUT` the bytes to. When the filename \
        carries an extension the final serving URL is known up front; otherwise `objectName` is a \
        bare token, `url` is null, and the extension is inferred from the uploaded content.",
    request_body = UploadParamsRequest,
    responses(
        (status = 200, description = "Upload parameters", body = UploadParamsResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("bearer" = [])),
)]
#[instrument(skip(state, _session, payload))]
pub async fn create_upload_params(
    _session: AdminSession,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UploadParamsRequest>,
) -> Result<Json<UploadParamsResponse>, AppError> {
    let filename = optional_filename(payload.filename.as_deref())
        .map_err(|e| AppError::Validation(e.message().into()))?;

    let reservation = state.uploads.reserve(filename.as_deref());
    let object_name = reservation.object_name();

    Ok(Json(UploadParamsResponse {
        url: reservation
            .object_id()
            .map(|id| state.config.public_url_for(&id.canonical_path())),
        upload_url: state
            .config
            .public_url_for(&format!("{DIRECT_UPLOAD_PATH}/{object_name}")),
        object_name,
    }))
}

#[utoipa::path(
    put,
    path = "/direct-upload/{object_name}",
    tag = "Objects",
    operation_id = "directUpload",
    summary = "Upload raw bytes under a reserved name",
    description = "Streams the request body into storage under `object_name`, which is either a \
        full `<token>.<ext>` name or a bare token from `POST /upload`. The original filename may \
        be sent in the `X-File-Name` header. Objects are never overwritten.",
    params(
        ("object_name" = String, Path, description = "Reserved object name or token"),
        ("X-File-Name" = Option<String>, Header, description = "Original filename"),
    ),
    request_body(content_type = "application/octet-stream", description = "Raw file bytes"),
    responses(
        (status = 200, description = "Object stored", body = DirectUploadResponse),
        (status = 400, description = "Empty body or bad object name (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 409, description = "Object already exists (CONFLICT)", body = ErrorBody),
        (status = 413, description = "Upload too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 415, description = "Unknown file type under strict policy (UNSUPPORTED_MEDIA_TYPE)", body = ErrorBody),
    ),
    security(("bearer" = [])),
)]
#[instrument(skip(state, _session, headers, body), fields(object_name = %object_name))]
pub async fn direct_upload(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(object_name): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<DirectUploadResponse>, AppError> {
    // Reject a bad name before reading the body.
    if object_name.contains('.') {
        ObjectId::parse(&object_name)?;
    } else {
        parse_token(&object_name)?;
    }

    let filename = optional_filename(header_str(&headers, FILE_NAME_HEADER))
        .map_err(|e| AppError::Validation(e.message().into()))?;

    let request = UploadRequest {
        filename,
        content_type: header_str(&headers, header::CONTENT_TYPE.as_str()).map(str::to_string),
        object_name: Some(object_name),
    };

    let receipt = state
        .uploads
        .receive_stream(request, body.into_data_stream())
        .await?;

    Ok(Json(DirectUploadResponse {
        success: true,
        object_name: receipt.object_name.to_string(),
        url: state.config.public_url_for(&receipt.canonical_path),
        location: receipt.canonical_path,
    }))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Objects",
    operation_id = "uploadObject",
    summary = "Upload a file",
    description = "Stores the `file` multipart field under a freshly generated object name. \
        Oversized JPEG and PNG images are downsampled before storage.",
    request_body(content_type = "multipart/form-data", description = "Multipart form with a `file` field"),
    responses(
        (status = 201, description = "Object stored", body = UploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 413, description = "Upload too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 415, description = "Unknown file type under strict policy (UNSUPPORTED_MEDIA_TYPE)", body = ErrorBody),
    ),
    security(("bearer" = [])),
)]
#[instrument(skip(state, _session, multipart))]
pub async fn upload_object(
    _session: AdminSession,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_size = state.uploads.max_bytes();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        if field.name() != Some("file") {
            continue; // Ignore unknown fields.
        }

        let filename = optional_filename(field.file_name())
            .map_err(|e| AppError::Validation(e.message().into()))?;
        let content_type = field.content_type().map(str::to_string);

        let mut data = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_size))?
        {
            if (data.len() + chunk.len()) as u64 > max_size {
                return Err(AppError::PayloadTooLarge { limit: max_size });
            }
            data.extend_from_slice(&chunk);
        }

        let request = UploadRequest {
            filename,
            content_type,
            object_name: None,
        };
        let receipt = state.uploads.receive(request, data.freeze()).await?;
        let url = state.config.public_url_for(&receipt.canonical_path);

        return Ok((StatusCode::CREATED, Json(UploadResponse::new(receipt, url))));
    }

    Err(AppError::Validation("Missing 'file' field".into()))
}

#[utoipa::path(
    delete,
    path = "/{identifier}",
    tag = "Objects",
    operation_id = "deleteObject",
    summary = "Delete an object",
    params(("identifier" = String, Path, description = "Object name")),
    responses(
        (status = 204, description = "Object deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Object not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("bearer" = [])),
)]
#[instrument(skip(state, _session), fields(identifier = %identifier))]
pub async fn delete_object(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = ObjectId::parse(&identifier)
        .map_err(|_| AppError::NotFound("Object not found".into()))?;

    if !state.blob_store.delete(&id).await? {
        return Err(AppError::NotFound("Object not found".into()));
    }

    tracing::info!(object_name = %id, "Deleted object");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/resolve",
    tag = "Objects",
    operation_id = "resolveReferences",
    summary = "Canonicalize stored image references",
    description = "Maps references persisted in older formats (absolute URLs, bare identifiers, \
        legacy direct-upload URLs) to the form they should be stored in. Intended for migrating \
        existing records.",
    request_body = ReferencesRequest,
    responses(
        (status = 200, description = "Resolved references, in request order", body = ResolveResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("bearer" = [])),
)]
#[instrument(skip(state, _session, payload), fields(count = payload.references.len()))]
pub async fn resolve_references(
    _session: AdminSession,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ReferencesRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    validate_references(&payload)?;

    let resolved = payload
        .references
        .into_iter()
        .map(|reference| ResolvedReference {
            resolved: state.resolver.resolve(&reference),
            reference,
        })
        .collect();

    Ok(Json(ResolveResponse { resolved }))
}

#[utoipa::path(
    post,
    path = "/purge",
    tag = "Objects",
    operation_id = "purgeReferences",
    summary = "Delete the objects behind a set of references",
    description = "Best effort: used when the owning record (e.g. a product) is deleted. \
        References to external URLs are skipped, and one failed deletion does not stop the rest.",
    request_body = ReferencesRequest,
    responses(
        (status = 200, description = "Purge outcome", body = PurgeResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("bearer" = [])),
)]
#[instrument(skip(state, _session, payload), fields(count = payload.references.len()))]
pub async fn purge_references(
    _session: AdminSession,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ReferencesRequest>,
) -> Result<Json<PurgeResponse>, AppError> {
    validate_references(&payload)?;

    let mut outcome = PurgeResponse::default();

    for reference in payload.references {
        let Some(identifier) = state.resolver.identifier_of(&reference) else {
            outcome.skipped.push(reference);
            continue;
        };
        let Ok(id) = ObjectId::parse(&identifier) else {
            outcome.missing.push(identifier);
            continue;
        };

        match state.blob_store.delete(&id).await {
            Ok(true) => outcome.removed.push(identifier),
            Ok(false) => outcome.missing.push(identifier),
            Err(e) => {
                warn!(object_name = %id, error = %e, "Failed to purge object");
                outcome.failed.push(identifier);
            }
        }
    }

    tracing::info!(
        removed = outcome.removed.len(),
        missing = outcome.missing.len(),
        skipped = outcome.skipped.len(),
        failed = outcome.failed.len(),
        "Purged object references"
    );
    Ok(Json(outcome))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn multipart_error(err: MultipartError, limit: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::from(StorageError::Interrupted(err.body_text()))
    }
}
