use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "derived_asset")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Master image this rendition was derived from.
    #[sea_orm(unique_key = "parent_size")]
    pub parent_id: i64,
    /// Requested bounding-box size in pixels.
    #[sea_orm(unique_key = "parent_size")]
    pub size: i32,

    pub width: i32,
    pub height: i32,

    pub name: String,

    /// Object key of the encoded bytes in the blob store.
    pub storage_key: String,

    /// SHA-256 of the encoded bytes, lowercase hex.
    pub checksum: String,

    pub byte_size: i64,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
