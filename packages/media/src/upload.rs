use std::fmt::Display;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::identifier::{ObjectId, extension_from_filename, parse_token};
use crate::normalize::{ImageNormalizer, Normalized};
use crate::sniff::{ImageKind, SNIFF_LEN, TypePolicy, infer_extension};
use crate::storage::{BlobStore, PutOptions, StorageError};

/// Client-supplied details accompanying an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Original filename, used for extension inference.
    pub filename: Option<String>,
    /// Content type the client declared.
    pub content_type: Option<String>,
    /// Pre-assigned identifier: either a full `<token>.<ext>` or a bare token.
    pub object_name: Option<String>,
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub object_name: ObjectId,
    pub canonical_path: String,
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// An identifier handed out before the bytes arrive.
///
/// When the filename has no usable extension only the token is fixed; the
/// extension is chosen once the content can be inspected.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub token: Uuid,
    pub extension: Option<String>,
}

impl Reservation {
    /// Full identifier if the extension is known, the bare token otherwise.
    pub fn object_name(&self) -> String {
        match &self.extension {
            Some(ext) => format!("{}.{ext}", self.token.simple()),
            None => self.token.simple().to_string(),
        }
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        let ext = self.extension.as_deref()?;
        ObjectId::with_token(self.token, ext).ok()
    }
}

/// Accepts uploaded bytes and persists them under a fresh identifier.
pub struct UploadReceiver {
    store: Arc<dyn BlobStore>,
    normalizer: ImageNormalizer,
    max_bytes: u64,
    policy: TypePolicy,
}

impl UploadReceiver {
    pub fn new(
        store: Arc<dyn BlobStore>,
        normalizer: ImageNormalizer,
        max_bytes: u64,
        policy: TypePolicy,
    ) -> Self {
        Self {
            store,
            normalizer,
            max_bytes,
            policy,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Hand out an identifier for a later direct upload.
    pub fn reserve(&self, filename: Option<&str>) -> Reservation {
        Reservation {
            token: Uuid::new_v4(),
            extension: filename.and_then(extension_from_filename),
        }
    }

    /// Read a body stream (bounded by the size limit) and store it.
    pub async fn receive_stream<S, E>(
        &self,
        request: UploadRequest,
        stream: S,
    ) -> Result<UploadReceipt, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let data = collect_limited(stream, self.max_bytes).await?;
        self.receive(request, data).await
    }

    /// Store an upload that is already in memory.
    pub async fn receive(
        &self,
        request: UploadRequest,
        data: Bytes,
    ) -> Result<UploadReceipt, StorageError> {
        if data.is_empty() {
            return Err(StorageError::EmptyPayload);
        }
        let size = data.len() as u64;
        if size > self.max_bytes {
            return Err(StorageError::PayloadTooLarge {
                actual: size,
                limit: self.max_bytes,
            });
        }

        let id = self.assign_identifier(&request, &data)?;
        let data = self.normalize(&id, data).await;

        let options = PutOptions {
            content_type: request.content_type.clone(),
            original_filename: request.filename.clone(),
        };
        let stored = self.store.put(&id, &data, &options).await?;

        info!(
            object_name = %id,
            received = size,
            stored = stored.size,
            backend = self.store.backend_name(),
            "Stored upload"
        );

        Ok(UploadReceipt {
            canonical_path: id.canonical_path(),
            object_name: id,
            size: stored.size,
            content_type: stored.content_type,
            created_at: stored.created_at,
        })
    }

    /// Decide the identifier an upload is stored under.
    fn assign_identifier(
        &self,
        request: &UploadRequest,
        data: &[u8],
    ) -> Result<ObjectId, StorageError> {
        let head = &data[..data.len().min(SNIFF_LEN)];
        let infer = || {
            infer_extension(
                request.filename.as_deref(),
                request.content_type.as_deref(),
                head,
                self.policy,
            )
        };

        match request.object_name.as_deref().map(str::trim) {
            Some(name) if name.contains('.') => ObjectId::parse(name),
            Some(name) => ObjectId::with_token(parse_token(name)?, &infer()?),
            None => ObjectId::generate(&infer()?),
        }
    }

    async fn normalize(&self, id: &ObjectId, data: Bytes) -> Bytes {
        let Some(kind) = ImageKind::from_extension(id.extension()) else {
            return data;
        };
        if !self.normalizer.applies_to(kind) {
            return data;
        }

        let normalizer = self.normalizer.clone();
        let input = data.clone();
        match tokio::task::spawn_blocking(move || normalizer.normalize(&input, kind)).await {
            Ok(Normalized::Transcoded { data: out, .. }) if out.len() > data.len() => {
                warn!(
                    object_name = %id,
                    original = data.len(),
                    transcoded = out.len(),
                    "Normalized image is larger than the upload, keeping original bytes"
                );
                data
            }
            Ok(Normalized::Transcoded {
                data: out,
                width,
                height,
            }) => {
                info!(object_name = %id, width, height, "Normalized oversized image");
                Bytes::from(out)
            }
            Ok(Normalized::Original) => data,
            Err(e) => {
                warn!(object_name = %id, error = %e, "Normalization task failed, keeping original bytes");
                data
            }
        }
    }
}

/// Collect a byte stream, failing as soon as it grows past `max` bytes.
pub async fn collect_limited<S, E>(stream: S, max: u64) -> Result<Bytes, StorageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut buf = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| StorageError::Interrupted(e.to_string()))?;
        let total = (buf.len() + chunk.len()) as u64;
        if total > max {
            return Err(StorageError::PayloadTooLarge {
                actual: total,
                limit: max,
            });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}
