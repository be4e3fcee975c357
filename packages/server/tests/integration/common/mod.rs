use std::net::SocketAddr;
use std::sync::OnceLock;

use reqwest::Client;
use serde_json::Value;
use tempfile::TempDir;

use media::{NormalizerConfig, TypePolicy};
use server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, ServerConfig, StorageBackend, StorageConfig,
};
use server::state::AppState;

pub const ADMIN_PASSWORD: &str = "storefront-admin";

/// Hashing is slow in debug builds; share one hash across the binary.
fn admin_password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        server::utils::hash::hash_password(ADMIN_PASSWORD).expect("Failed to hash admin password")
    })
}

pub mod routes {
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const LOGOUT: &str = "/api/v1/auth/logout";
    pub const OBJECTS: &str = "/api/v1/objects";
    pub const UPLOAD_PARAMS: &str = "/api/v1/objects/upload";
    pub const RESOLVE: &str = "/api/v1/objects/resolve";
    pub const PURGE: &str = "/api/v1/objects/purge";

    pub fn direct_upload(object_name: &str) -> String {
        format!("/api/v1/objects/direct-upload/{object_name}")
    }

    pub fn object(identifier: &str) -> String {
        format!("/api/v1/objects/{identifier}")
    }

    pub fn serve(identifier: &str) -> String {
        format!("/objects/{identifier}")
    }
}

/// A running test server backed by a temporary filesystem store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub storage_root: std::path::PathBuf,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

pub fn test_config(storage_root: std::path::PathBuf) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            public_url: String::new(),
            cors: CorsConfig::default(),
        },
        storage: StorageConfig {
            backend: StorageBackend::Filesystem,
            root: storage_root,
            max_upload_bytes: 256 * 1024,
            cache_max_age: 600,
            type_policy: TypePolicy::Lenient,
            ..Default::default()
        },
        database: DatabaseConfig::default(),
        images: NormalizerConfig {
            max_dimension: 200,
            ..Default::default()
        },
        auth: AuthConfig {
            admin_password_hash: admin_password_hash().to_string(),
            session_ttl_secs: 3600,
            sweep_interval_secs: 60,
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with a tweaked configuration.
    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let storage_root = dir.path().join("objects");

        let mut config = test_config(storage_root.clone());
        configure(&mut config);

        let blob_store = server::storage::open_blob_store(&config)
            .await
            .expect("Failed to open blob store");
        let app = server::build_router(AppState::new(config, blob_store));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            storage_root,
            _dir: dir,
        }
    }

    /// Spawn with the database backend on a SQLite file beside the storage root.
    pub async fn spawn_on_database() -> Self {
        Self::spawn_with(|config| {
            let db_path = config.storage.root.with_file_name("media.db");
            config.storage.backend = StorageBackend::Database;
            config.database.url = Some(format!("sqlite://{}?mode=rwc", db_path.display()));
        })
        .await
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// GET returning the raw response, for header and byte assertions.
    pub async fn get_raw(&self, path: &str, headers: &[(&str, &str)]) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.send().await.expect("Failed to send GET request")
    }

    pub async fn get_bytes(&self, path: &str) -> (u16, Vec<u8>) {
        let res = self.get_raw(path, &[]).await;
        let status = res.status().as_u16();
        let bytes = res.bytes().await.expect("Failed to read body");
        (status, bytes.to_vec())
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    /// PUT raw bytes, optionally with an `X-File-Name` header.
    pub async fn put_bytes_with_token(
        &self,
        path: &str,
        bytes: Vec<u8>,
        file_name: Option<&str>,
        token: &str,
    ) -> TestResponse {
        let mut req = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        if let Some(name) = file_name {
            req = req.header("X-File-Name", name);
        }

        let res = req.send().await.expect("Failed to send PUT request");
        TestResponse::from_response(res).await
    }

    pub async fn upload_with_token(
        &self,
        file_name: &str,
        mime: &str,
        file_bytes: Vec<u8>,
        token: &str,
    ) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .expect("Failed to set MIME type");
        let form = reqwest::multipart::Form::new().part("file", part);

        let res = self
            .client
            .post(self.url(routes::OBJECTS))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Log in as admin, returning the session token.
    pub async fn login(&self) -> String {
        let res = self
            .post_without_token(routes::LOGIN, &serde_json::json!({"password": ADMIN_PASSWORD}))
            .await;
        assert_eq!(res.status, 200, "Login failed: {}", res.text);

        res.body["token"]
            .as_str()
            .expect("Login response should contain a token")
            .to_string()
    }

    /// Upload bytes via multipart and return the object name.
    pub async fn upload(&self, token: &str, file_name: &str, bytes: Vec<u8>) -> String {
        let res = self
            .upload_with_token(file_name, "application/octet-stream", bytes, token)
            .await;
        assert_eq!(res.status, 201, "Upload failed: {}", res.text);
        res.body["objectName"]
            .as_str()
            .expect("Upload response should contain objectName")
            .to_string()
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }
}

/// Encode a solid-color PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    out.into_inner()
}
