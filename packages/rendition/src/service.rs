use std::sync::Arc;

use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::asset::MasterId;
use crate::codec::ImageRsCodec;
use crate::config::{ImageOptions, RenditionAppConfig};
use crate::database::init_db;
use crate::engine::RenditionEngine;
use crate::error::{RepositoryError, Result};
use crate::events::TracingSink;
use crate::repository::SeaOrmRepository;
use crate::source::{SourceError, StoredMaster};

/// Production wiring: filesystem blobs, SeaORM metadata, `image` codec and
/// `tracing` events.
#[derive(Clone)]
pub struct RenditionService {
    pub engine: RenditionEngine,
    pub store: Arc<dyn BlobStore>,
    pub db: DatabaseConnection,
    pub options: ImageOptions,
}

impl RenditionService {
    pub async fn from_config(config: &RenditionAppConfig) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn BlobStore> = Arc::new(
            FilesystemBlobStore::from_config(&config.storage)
                .await
                .map_err(RepositoryError::from)?,
        );
        let db = init_db(&config.database)
            .await
            .map_err(RepositoryError::from)?;

        let repository = SeaOrmRepository::new(db.clone(), Arc::clone(&store), &config.images);
        let engine = RenditionEngine::new(
            Arc::new(repository),
            Arc::new(ImageRsCodec::new(&config.images)),
            Arc::new(TracingSink),
        )
        .with_timeout(config.engine.regenerate_timeout());

        info!(
            base_path = %config.storage.base_path,
            storage_path = %config.images.storage_path,
            quality = config.images.quality,
            "Rendition service ready"
        );

        Ok(Self {
            engine,
            store,
            db,
            options: config.images.clone(),
        })
    }

    /// Store a new master image in this service's blob store.
    pub async fn upload_master(
        &self,
        id: MasterId,
        file_name: &str,
        bytes: &[u8],
    ) -> std::result::Result<StoredMaster, SourceError> {
        StoredMaster::upload(Arc::clone(&self.store), &self.options, id, file_name, bytes).await
    }
}
