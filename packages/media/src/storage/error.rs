use thiserror::Error;

/// Errors raised by blob stores and the upload pipeline.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No blob exists under the requested identifier.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The payload exceeds the configured size limit.
    #[error("payload exceeds size limit ({actual} > {limit} bytes)")]
    PayloadTooLarge { actual: u64, limit: u64 },

    #[error("payload is empty")]
    EmptyPayload,

    /// The identifier is not in canonical `<token>.<ext>` form.
    #[error("invalid object identifier: {0}")]
    InvalidIdentifier(String),

    /// Strict type policy could not determine a file type.
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    /// Blobs are never overwritten.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// The request body stream failed before it was fully read.
    #[error("upload interrupted: {0}")]
    Interrupted(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    /// Wrap any backend-specific error.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }
}
