use std::sync::Arc;

use async_trait::async_trait;
use common::storage::{BlobStore, ObjectKey};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::AssetRepository;
use crate::asset::{DerivedAsset, MasterId, NewAsset};
use crate::config::ImageOptions;
use crate::entity::derived_asset;
use crate::error::RepositoryError;

/// [`AssetRepository`] over a SeaORM connection and a [`BlobStore`].
///
/// Bytes are written to `<storage_path>/<parent>/<asset id>/<name>` before
/// the row is inserted. The `(parent_id, size)` unique key turns a losing
/// concurrent insert into a re-read of the winner's row.
pub struct SeaOrmRepository {
    db: DatabaseConnection,
    store: Arc<dyn BlobStore>,
    storage_path: String,
}

impl SeaOrmRepository {
    pub fn new(db: DatabaseConnection, store: Arc<dyn BlobStore>, options: &ImageOptions) -> Self {
        Self {
            db,
            store,
            storage_path: options.storage_path.clone(),
        }
    }

    /// Public URL of a stored key, or `None` if the key is invalid or its
    /// bytes are missing.
    async fn locate(&self, storage_key: &str) -> Result<Option<String>, RepositoryError> {
        let Ok(key) = ObjectKey::parse(storage_key) else {
            return Ok(None);
        };
        if self.store.exists(&key).await? {
            Ok(Some(self.store.url(&key)))
        } else {
            Ok(None)
        }
    }

    /// Best effort.
    async fn discard_blob(&self, key: &ObjectKey) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key = %key, error = %e, "Failed to remove orphaned rendition blob");
        }
    }
}

fn to_asset(
    model: derived_asset::Model,
    location: Option<String>,
) -> Result<DerivedAsset, RepositoryError> {
    Ok(DerivedAsset {
        id: model.id,
        parent_id: model.parent_id,
        size: column_value(model.size, "size")?,
        width: column_value(model.width, "width")?,
        height: column_value(model.height, "height")?,
        name: model.name,
        storage_key: model.storage_key,
        location,
        checksum: model.checksum,
        byte_size: column_value(model.byte_size, "byte_size")?,
        created_at: model.created_at,
    })
}

/// Convert between domain and column integer types, rejecting values the
/// target cannot hold.
fn column_value<S, T: TryFrom<S>>(value: S, column: &'static str) -> Result<T, RepositoryError> {
    T::try_from(value).map_err(|_| RepositoryError::OutOfRange(column))
}


#[async_trait]
impl AssetRepository for SeaOrmRepository {
    #[instrument(skip(self))]
    async fn find(
        &self,
        parent_id: MasterId,
        size: u32,
    ) -> Result<Option<DerivedAsset>, RepositoryError> {
        let size: i32 = column_value(size, "size")?;
        let Some(model) = derived_asset::Entity::find()
            .filter(derived_asset::Column::ParentId.eq(parent_id))
            .filter(derived_asset::Column::Size.eq(size))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let location = self.locate(&model.storage_key).await?;
        Ok(Some(to_asset(model, location)?))
    }

    #[instrument(skip(self, asset), fields(asset_id = %asset.id))]
    async fn delete(&self, asset: &DerivedAsset) -> Result<(), RepositoryError> {
        // Row first, so readers never see a row whose bytes are gone.
        let result = derived_asset::Entity::delete_by_id(asset.id)
            .exec(&self.db)
            .await?;

        if let Ok(key) = ObjectKey::parse(&asset.storage_key) {
            self.store.delete(&key).await?;
        }

        debug!(rows = result.rows_affected, "Deleted rendition");
        Ok(())
    }

    #[instrument(skip(self, asset), fields(parent_id = asset.parent_id, size = asset.size))]
    async fn create(&self, asset: NewAsset) -> Result<DerivedAsset, RepositoryError> {
        let id = Uuid::now_v7();
        let key = ObjectKey::from_segments([
            self.storage_path.as_str(),
            asset.parent_id.to_string().as_str(),
            id.to_string().as_str(),
            asset.name.as_str(),
        ])?;

        let size: i32 = column_value(asset.size, "size")?;
        let width: i32 = column_value(asset.width, "width")?;
        let height: i32 = column_value(asset.height, "height")?;
        let byte_size: i64 = column_value(asset.bytes.len() as u64, "byte_size")?;

        let blob = self.store.put(&key, &asset.bytes).await?;

        let model = derived_asset::ActiveModel {
            id: Set(id),
            parent_id: Set(asset.parent_id),
            size: Set(size),
            width: Set(width),
            height: Set(height),
            name: Set(asset.name.clone()),
            storage_key: Set(key.to_string()),
            checksum: Set(blob.checksum),
            byte_size: Set(byte_size),
            created_at: Set(asset.created_at),
        };

        match model.insert(&self.db).await {
            Ok(inserted) => to_asset(inserted, Some(self.store.url(&key))),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                warn!(
                    parent_id = asset.parent_id,
                    size = asset.size,
                    "Rendition created concurrently, using existing row"
                );
                self.discard_blob(&key).await;
                self.find(asset.parent_id, asset.size).await?.ok_or_else(|| {
                    RepositoryError::Conflict(
                        "UniqueConstraintViolation but existing row not found".to_string(),
                    )
                })
            }
            Err(e) => {
                self.discard_blob(&key).await;
                Err(e.into())
            }
        }
    }
}
