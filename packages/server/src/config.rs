use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use media::{NormalizerConfig, TypePolicy};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public origin prefixed to returned URLs, e.g. `https://shop.example.com`.
    /// Empty means URLs are returned as paths.
    #[serde(default)]
    pub public_url: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    Database,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory of the filesystem backend. Default: `./data/objects`.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Largest accepted upload in bytes. Default: 10 MiB.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// `Cache-Control` max-age for served objects, in seconds. Default: 3600.
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age: u64,
    #[serde(default)]
    pub type_policy: TypePolicy,
    /// URL fragments marking references written by the old direct-upload endpoint.
    #[serde(default = "default_legacy_markers")]
    pub legacy_markers: Vec<String>,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/objects")
}
fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_cache_max_age() -> u64 {
    3600
}
fn default_legacy_markers() -> Vec<String> {
    vec![media::resolver::DEFAULT_LEGACY_MARKER.to_string()]
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_storage_root(),
            max_upload_bytes: default_max_upload_bytes(),
            cache_max_age: default_cache_max_age(),
            type_policy: TypePolicy::default(),
            legacy_markers: default_legacy_markers(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Required when `storage.backend = "database"`.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Argon2 PHC string of the admin password. Generate with `server hash-password`.
    pub admin_password_hash: String,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_session_ttl_secs() -> u64 {
    12 * 60 * 60
}
fn default_sweep_interval_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub images: NormalizerConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("STOREFRONT_CONFIG").unwrap_or_else(|_| "config/config".into());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .add_source(File::with_name(&path).required(false))
            // Override from environment (e.g., STOREFRONT__STORAGE__BACKEND=database)
            .add_source(
                Environment::with_prefix("STOREFRONT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Absolute URL for a path, when a public origin is configured.
    pub fn public_url_for(&self, path: &str) -> String {
        let origin = self.server.public_url.trim_end_matches('/');
        format!("{origin}{path}")
    }
}
