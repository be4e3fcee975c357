pub mod database;

use std::sync::Arc;
use std::time::Duration;

use media::BlobStore;
use media::storage::FilesystemBlobStore;
use tracing::info;

pub use database::DatabaseBlobStore;

use crate::config::{AppConfig, StorageBackend};

/// Temp files younger than this may belong to an upload still in flight.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Open the blob store selected by `storage.backend`.
pub async fn open_blob_store(config: &AppConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    let max_size = config.storage.max_upload_bytes;

    match config.storage.backend {
        StorageBackend::Filesystem => {
            let store = FilesystemBlobStore::new(config.storage.root.clone(), max_size).await?;
            let removed = store.sweep_temp(STALE_TEMP_AGE).await?;
            if removed > 0 {
                info!(removed, "Removed stale temp files from aborted uploads");
            }
            info!(root = %config.storage.root.display(), "Using filesystem blob store");
            Ok(Arc::new(store))
        }
        StorageBackend::Database => {
            let url = config.database.url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("database.url is required for the database storage backend")
            })?;
            let db = crate::database::init_db(url).await?;
            info!("Using database blob store");
            Ok(Arc::new(DatabaseBlobStore::new(db, max_size)))
        }
    }
}
