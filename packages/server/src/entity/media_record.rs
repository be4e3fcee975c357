use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An uploaded object held by the database storage backend.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media_record")]
pub struct Model {
    /// Canonical `<token>.<ext>` identifier.
    #[sea_orm(primary_key, auto_increment = false)]
    pub object_name: String,

    pub original_filename: Option<String>,

    /// Content type resolved at upload time.
    pub content_type: String,

    /// Decoded size in bytes.
    pub size: i64,

    /// Base64-encoded content.
    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub data: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
