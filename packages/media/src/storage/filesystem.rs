use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncReadExt, BufReader};

use super::error::StorageError;
use super::traits::{BlobInfo, BlobStore, OpenedBlob, PutOptions};
use crate::identifier::ObjectId;
use crate::sniff::{SNIFF_LEN, content_type_for};

const TEMP_DIR: &str = ".tmp";

/// Filesystem-backed blob store.
///
/// Blobs are stored under a two-character shard directory taken from the
/// token: `{base_path}/{token[0..2]}/{token}.{ext}`. Writes land in
/// `{base_path}/.tmp` first and are linked into place; an existing blob is
/// never replaced.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(TEMP_DIR)).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn blob_path(&self, id: &ObjectId) -> PathBuf {
        self.base_path
            .join(id.shard_prefix())
            .join(id.to_string())
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(TEMP_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Remove temp files at least `min_age` old, left behind by writes that
    /// never completed. Returns how many were removed.
    pub async fn sweep_temp(&self, min_age: Duration) -> Result<usize, StorageError> {
        let mut entries = fs::read_dir(self.base_path.join(TEMP_DIR)).await?;
        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let modified = entry.metadata().await?.modified()?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age >= min_age && fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn info_for(&self, id: &ObjectId, path: &Path) -> Result<BlobInfo, StorageError> {
        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let created_at = meta
            .created()
            .or_else(|_| meta.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let content_type = if mime_guess::from_ext(id.extension()).first().is_some() {
            content_type_for(id.extension(), &[])
        } else {
            content_type_for(id.extension(), &read_head(path).await?)
        };

        Ok(BlobInfo {
            id: id.clone(),
            size: meta.len(),
            content_type,
            created_at,
        })
    }
}

async fn read_head(path: &Path) -> Result<Vec<u8>, StorageError> {
    let file = fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(head)
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn put(
        &self,
        id: &ObjectId,
        data: &[u8],
        options: &PutOptions,
    ) -> Result<BlobInfo, StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::PayloadTooLarge {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let blob_path = self.blob_path(id);
        if fs::try_exists(&blob_path).await? {
            return Err(StorageError::AlreadyExists(id.to_string()));
        }

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // A hard link fails if the target exists, unlike rename which replaces it.
        let published = fs::hard_link(&temp_path, &blob_path).await;
        let _ = fs::remove_file(&temp_path).await;
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        // The extension decides the served type; a declared type is not persisted here.
        let head = &data[..data.len().min(SNIFF_LEN)];
        let content_type = content_type_for(id.extension(), head);
        if let Some(declared) = &options.content_type
            && !declared.eq_ignore_ascii_case(&content_type)
        {
            tracing::debug!(object_name = %id, %declared, served = %content_type, "Declared content type differs from extension");
        }

        Ok(BlobInfo {
            id: id.clone(),
            size: data.len() as u64,
            content_type,
            created_at: Utc::now(),
        })
    }

    async fn open(&self, id: &ObjectId) -> Result<OpenedBlob, StorageError> {
        let blob_path = self.blob_path(id);
        let file = match fs::File::open(&blob_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let info = self.info_for(id, &blob_path).await?;

        Ok(OpenedBlob {
            info,
            reader: Box::new(BufReader::new(file)),
        })
    }

    async fn head(&self, id: &ObjectId) -> Result<BlobInfo, StorageError> {
        self.info_for(id, &self.blob_path(id)).await
    }

    async fn exists(&self, id: &ObjectId) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(id)).await?)
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, StorageError> {
        match fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
