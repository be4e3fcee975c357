pub mod identifier;
pub mod normalize;
pub mod resolver;
pub mod sniff;
pub mod storage;
pub mod upload;

pub use identifier::{CANONICAL_PREFIX, ObjectId};
pub use normalize::{ImageNormalizer, Normalized, NormalizerConfig};
pub use resolver::PathResolver;
pub use sniff::{ImageKind, TypePolicy};
pub use storage::{BlobInfo, BlobStore, BoxReader, OpenedBlob, PutOptions, StorageError};
pub use upload::{Reservation, UploadReceipt, UploadReceiver, UploadRequest};
