use std::io::Cursor;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use media::sniff::{SNIFF_LEN, content_type_for};
use media::{BlobInfo, BlobStore, ObjectId, OpenedBlob, PutOptions, StorageError};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, FromQueryResult, QuerySelect, Set, SqlErr,
};

use crate::entity::media_record;

/// Blob store keeping base64-encoded content in the `media_record` table.
pub struct DatabaseBlobStore {
    db: DatabaseConnection,
    max_size: u64,
}

#[derive(Debug, FromQueryResult)]
struct RecordHead {
    content_type: String,
    size: i64,
    created_at: DateTime<Utc>,
}

impl DatabaseBlobStore {
    pub fn new(db: DatabaseConnection, max_size: u64) -> Self {
        Self { db, max_size }
    }

    fn info(id: &ObjectId, content_type: String, size: i64, created_at: DateTime<Utc>) -> BlobInfo {
        BlobInfo {
            id: id.clone(),
            size: u64::try_from(size).unwrap_or_default(),
            content_type,
            created_at,
        }
    }
}

#[async_trait]
impl BlobStore for DatabaseBlobStore {
    fn backend_name(&self) -> &'static str {
        "database"
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

        let head = &data[..data.len().min(SNIFF_LEN)];
        let content_type = content_type_for(id.extension(), head);
        let size = i64::try_from(data.len()).unwrap_or(i64::MAX);
        let now = Utc::now();

        let record = media_record::ActiveModel {
            object_name: Set(id.to_string()),
            original_filename: Set(options.original_filename.clone()),
            content_type: Set(content_type.clone()),
            size: Set(size),
            data: Set(STANDARD.encode(data)),
            created_at: Set(now),
        };

        record.insert(&self.db).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => StorageError::AlreadyExists(id.to_string()),
            _ => StorageError::backend(e),
        })?;

        Ok(Self::info(id, content_type, size, now))
    }

    async fn open(&self, id: &ObjectId) -> Result<OpenedBlob, StorageError> {
        let record = media_record::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(StorageError::backend)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        let bytes = STANDARD
            .decode(record.data.as_bytes())
            .map_err(StorageError::backend)?;

        Ok(OpenedBlob {
            info: Self::info(id, record.content_type, bytes.len() as i64, record.created_at),
            reader: Box::new(Cursor::new(bytes)),
        })
    }

    async fn head(&self, id: &ObjectId) -> Result<BlobInfo, StorageError> {
        let head = media_record::Entity::find_by_id(id.to_string())
            .select_only()
            .columns([
                media_record::Column::ContentType,
                media_record::Column::Size,
                media_record::Column::CreatedAt,
            ])
            .into_model::<RecordHead>()
            .one(&self.db)
            .await
            .map_err(StorageError::backend)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        Ok(Self::info(id, head.content_type, head.size, head.created_at))
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, StorageError> {
        let result = media_record::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await
            .map_err(StorageError::backend)?;
        Ok(result.rows_affected > 0)
    }
}
