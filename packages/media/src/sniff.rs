//! Content type and extension inference.

use serde::Deserialize;

use crate::identifier::{extension_from_filename, normalize_extension};
use crate::storage::StorageError;

/// Bytes needed to recognize every supported signature.
pub const SNIFF_LEN: usize = 12;

/// Extension used when nothing else identifies an upload (lenient policy).
pub const DEFAULT_EXTENSION: &str = "jpg";

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Raster formats recognized by their magic numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    /// Match the leading bytes against the known signatures.
    pub fn sniff(head: &[u8]) -> Option<Self> {
        match head {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', ..] => Some(Self::Png),
            [b'G', b'I', b'F', b'8', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

/// How to pick an extension for uploads whose type is not declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypePolicy {
    /// Filename extension, then magic bytes, then `jpg`.
    #[default]
    Lenient,
    /// Filename extension, declared content type, then magic bytes;
    /// anything unrecognized is rejected.
    Strict,
}

/// Choose the stored extension for an upload.
pub fn infer_extension(
    filename: Option<&str>,
    declared_type: Option<&str>,
    head: &[u8],
    policy: TypePolicy,
) -> Result<String, StorageError> {
    if let Some(ext) = filename.and_then(extension_from_filename) {
        return Ok(ext);
    }

    match policy {
        TypePolicy::Lenient => Ok(ImageKind::sniff(head)
            .map(ImageKind::extension)
            .unwrap_or(DEFAULT_EXTENSION)
            .to_string()),
        TypePolicy::Strict => declared_type
            .and_then(extension_for_mime)
            .or_else(|| ImageKind::sniff(head).map(|kind| kind.extension().to_string()))
            .ok_or_else(|| {
                StorageError::UnsupportedType(
                    declared_type.unwrap_or("unknown binary").to_string(),
                )
            }),
    }
}

fn extension_for_mime(mime: &str) -> Option<String> {
    if let Some(kind) = ImageKind::from_mime(mime) {
        return Some(kind.extension().to_string());
    }
    let essence = mime.split(';').next()?.trim();
    if essence.eq_ignore_ascii_case(OCTET_STREAM) {
        return None;
    }
    mime_guess::get_mime_extensions_str(essence)?
        .first()
        .and_then(|ext| normalize_extension(ext))
}

/// Content type served for a blob: extension table, then magic bytes.
pub fn content_type_for(extension: &str, head: &[u8]) -> String {
    mime_guess::from_ext(extension)
        .first()
        .map(|mime| mime.to_string())
        .or_else(|| ImageKind::sniff(head).map(|kind| kind.mime().to_string()))
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}
