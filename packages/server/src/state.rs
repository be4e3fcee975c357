use std::sync::Arc;
use std::time::Duration;

use media::{BlobStore, ImageNormalizer, PathResolver, UploadReceiver};

use crate::config::AppConfig;
use crate::utils::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub blob_store: Arc<dyn BlobStore>,
    pub uploads: Arc<UploadReceiver>,
    pub resolver: Arc<PathResolver>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: AppConfig, blob_store: Arc<dyn BlobStore>) -> Self {
        let uploads = UploadReceiver::new(
            blob_store.clone(),
            ImageNormalizer::new(config.images.clone()),
            config.storage.max_upload_bytes,
            config.storage.type_policy,
        );
        let resolver = PathResolver::new(config.storage.legacy_markers.clone());
        let sessions = SessionStore::new(Duration::from_secs(config.auth.session_ttl_secs));

        Self {
            config: Arc::new(config),
            blob_store,
            uploads: Arc::new(uploads),
            resolver: Arc::new(resolver),
            sessions: Arc::new(sessions),
        }
    }
}
