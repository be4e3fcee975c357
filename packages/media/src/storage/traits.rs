use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use crate::identifier::ObjectId;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Metadata supplied alongside the bytes on write.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Content type to serve the blob with. Derived from the extension when absent.
    pub content_type: Option<String>,
    /// Filename the client uploaded, kept by backends that record it.
    pub original_filename: Option<String>,
}

/// What a store knows about a blob.
#[derive(Debug, Clone, Serialize)]
pub struct BlobInfo {
    pub id: ObjectId,
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// A blob opened for reading.
pub struct OpenedBlob {
    pub info: BlobInfo,
    pub reader: BoxReader,
}

/// Identifier-addressed blob storage.
///
/// Every backend stores and looks up blobs by their exact [`ObjectId`];
/// there is no fuzzy matching. Blobs are immutable once written.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Store bytes under `id`. Fails with `AlreadyExists` if `id` is taken.
    async fn put(
        &self,
        id: &ObjectId,
        data: &[u8],
        options: &PutOptions,
    ) -> Result<BlobInfo, StorageError>;

    /// Open a blob for streaming.
    async fn open(&self, id: &ObjectId) -> Result<OpenedBlob, StorageError>;

    /// Retrieve all bytes of a blob.
    async fn get(&self, id: &ObjectId) -> Result<Vec<u8>, StorageError> {
        let mut opened = self.open(id).await?;
        let mut buf = Vec::with_capacity(opened.info.size as usize);
        opened.reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Blob metadata without the content.
    async fn head(&self, id: &ObjectId) -> Result<BlobInfo, StorageError>;

    async fn exists(&self, id: &ObjectId) -> Result<bool, StorageError> {
        match self.head(id).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete a blob. Returns `false` if it did not exist.
    async fn delete(&self, id: &ObjectId) -> Result<bool, StorageError>;
}
