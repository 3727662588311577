//! Storage of derived assets: blob bytes plus a metadata row.

mod orm;

pub use orm::SeaOrmRepository;

use async_trait::async_trait;

use crate::asset::{DerivedAsset, MasterId, NewAsset};
use crate::error::RepositoryError;

#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Look up the asset for `(parent_id, size)`.
    async fn find(
        &self,
        parent_id: MasterId,
        size: u32,
    ) -> Result<Option<DerivedAsset>, RepositoryError>;

    /// Remove the record and its bytes. Removing a missing asset succeeds.
    async fn delete(&self, asset: &DerivedAsset) -> Result<(), RepositoryError>;

    /// Persist bytes and metadata, assigning id and storage key. The asset
    /// becomes visible only once both are committed.
    async fn create(&self, asset: NewAsset) -> Result<DerivedAsset, RepositoryError>;
}
