use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StorageError;

/// Path prefix every stored blob is served under.
pub const CANONICAL_PREFIX: &str = "/objects/";

const TOKEN_LEN: usize = 32;
const MAX_EXTENSION_LEN: usize = 10;

/// Canonical identifier of a stored blob: `<token>.<ext>`.
///
/// The token is a random UUIDv4 rendered as 32 lowercase hex characters,
/// the extension is 1-10 lowercase ASCII alphanumerics. Each blob has
/// exactly one string form; parsing rejects everything else.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
    token: Uuid,
    extension: String,
}

impl ObjectId {
    /// Generate a fresh identifier with the given extension.
    pub fn generate(extension: &str) -> Result<Self, StorageError> {
        Self::with_token(Uuid::new_v4(), extension)
    }

    /// Build an identifier from an existing token.
    pub fn with_token(token: Uuid, extension: &str) -> Result<Self, StorageError> {
        let extension = normalize_extension(extension).ok_or_else(|| {
            StorageError::InvalidIdentifier(format!("invalid extension '{extension}'"))
        })?;
        Ok(Self { token, extension })
    }

    /// Parse a canonical identifier string.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let (token, extension) = s
            .split_once('.')
            .ok_or_else(|| StorageError::InvalidIdentifier(format!("missing extension in '{s}'")))?;

        let token = parse_token(token)?;
        if !is_canonical_extension(extension) {
            return Err(StorageError::InvalidIdentifier(format!(
                "invalid extension in '{s}'"
            )));
        }

        Ok(Self {
            token,
            extension: extension.to_string(),
        })
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    /// The token as 32 lowercase hex characters.
    pub fn token_hex(&self) -> String {
        self.token.simple().to_string()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// First 2 hex characters of the token (shard directory).
    pub fn shard_prefix(&self) -> String {
        self.token_hex()[..2].to_string()
    }

    /// `/objects/<identifier>`, the only form callers should persist.
    pub fn canonical_path(&self) -> String {
        format!("{CANONICAL_PREFIX}{self}")
    }
}

/// Parse a bare token. Only the 32-character lowercase hex form is accepted.
pub fn parse_token(s: &str) -> Result<Uuid, StorageError> {
    if s.len() != TOKEN_LEN
        || !s
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(StorageError::InvalidIdentifier(format!(
            "expected {TOKEN_LEN} lowercase hex characters, got '{s}'"
        )));
    }
    Uuid::try_parse(s).map_err(|e| StorageError::InvalidIdentifier(e.to_string()))
}

/// Lowercase an extension and strip a leading dot; `None` if it is not usable.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    is_canonical_extension(&ext).then_some(ext)
}

/// Extension taken from an original filename, if it has a usable one.
pub fn extension_from_filename(filename: &str) -> Option<String> {
    Path::new(filename.trim())
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(normalize_extension)
}

fn is_canonical_extension(ext: &str) -> bool {
    !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.token.simple(), self.extension)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl FromStr for ObjectId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
