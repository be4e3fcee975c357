use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use media::{BlobInfo, ObjectId};
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/objects/{identifier}",
    tag = "Objects",
    operation_id = "getObject",
    summary = "Fetch an object",
    description = "Streams the object stored under exactly `identifier`. Anything that is not a \
        stored object name, including suffixed or partial names, is a 404. Supports ETag-based \
        caching via If-None-Match. `HEAD` returns the same headers without a body.",
    params(("identifier" = String, Path, description = "Object name")),
    responses(
        (status = 200, description = "Object content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 404, description = "Object not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers, method), fields(identifier = %identifier))]
pub async fn get_object(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id = ObjectId::parse(&identifier)
        .map_err(|_| AppError::NotFound("Object not found".into()))?;

    let etag_value = format!("\"{id}\"");
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && val.split(',').any(|tag| {
            let tag = tag.trim();
            tag == etag_value || tag == "*"
        })
    {
        state.blob_store.head(&id).await?;
        return Ok((
            StatusCode::NOT_MODIFIED,
            [
                (header::ETAG, etag_value),
                (header::CACHE_CONTROL, cache_control(&state)),
            ],
        )
            .into_response());
    }

    if method == Method::HEAD {
        let info = state.blob_store.head(&id).await?;
        return build_response(&state, &info, &etag_value, Body::empty());
    }

    let opened = state.blob_store.open(&id).await?;
    let body = Body::from_stream(ReaderStream::new(opened.reader));
    build_response(&state, &opened.info, &etag_value, body)
}

fn build_response(
    state: &AppState,
    info: &BlobInfo,
    etag_value: &str,
    body: Body,
) -> Result<Response, AppError> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &info.content_type)
        .header(header::CONTENT_LENGTH, info.size.to_string())
        .header(header::ETAG, etag_value)
        .header(header::CACHE_CONTROL, cache_control(state))
        .header(
            header::LAST_MODIFIED,
            info.created_at.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        )
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    if is_scriptable(&info.content_type) {
        builder = builder.header(header::CONTENT_SECURITY_POLICY, "sandbox");
    }
    builder
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

fn cache_control(state: &AppState) -> String {
    format!("public, max-age={}", state.config.storage.cache_max_age)
}

/// Types a browser may run script from when opened directly.
fn is_scriptable(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    !essence.starts_with("image/") || essence == "image/svg+xml"
}
