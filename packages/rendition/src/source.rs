use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::storage::{BlobStore, ObjectKey, StorageError};
use thiserror::Error;
use tracing::info;

use crate::asset::MasterId;
use crate::config::ImageOptions;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unreadable image: {0}")]
    Unreadable(String),
}

/// A master image the engine can derive renditions from.
#[async_trait]
pub trait MasterSource: Send + Sync {
    fn id(&self) -> MasterId;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Last time the master's content changed.
    fn modified_at(&self) -> DateTime<Utc>;

    /// Stored file name; its basename feeds derived asset names.
    fn file_name(&self) -> &str;

    /// Read the full encoded content.
    async fn open_bytes(&self) -> Result<Vec<u8>, SourceError>;
}

/// A master image whose bytes live in a [`BlobStore`].
#[derive(Clone)]
pub struct StoredMaster {
    id: MasterId,
    key: ObjectKey,
    width: u32,
    height: u32,
    modified_at: DateTime<Utc>,
    store: Arc<dyn BlobStore>,
}

impl StoredMaster {
    pub fn new(
        id: MasterId,
        key: ObjectKey,
        width: u32,
        height: u32,
        modified_at: DateTime<Utc>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            id,
            key,
            width,
            height,
            modified_at,
            store,
        }
    }

    /// Store `bytes` as master `id` under `<master_path>/<id>/<file_name>`.
    ///
    /// Dimensions are read from the image header.
    pub async fn upload(
        store: Arc<dyn BlobStore>,
        options: &ImageOptions,
        id: MasterId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Self, SourceError> {
        let (width, height) = probe_dimensions(bytes)?;
        let key = ObjectKey::from_segments([
            options.master_path.as_str(),
            id.to_string().as_str(),
            file_name,
        ])?;
        store.put(&key, bytes).await?;

        info!(master_id = id, key = %key, width, height, "Stored master image");
        Ok(Self::new(id, key, width, height, Utc::now(), store))
    }

    /// Overwrite the master content, which invalidates existing renditions.
    pub async fn replace(&mut self, bytes: &[u8]) -> Result<(), SourceError> {
        let (width, height) = probe_dimensions(bytes)?;
        self.store.put(&self.key, bytes).await?;
        self.width = width;
        self.height = height;
        self.modified_at = Utc::now();

        info!(master_id = self.id, key = %self.key, width, height, "Replaced master image");
        Ok(())
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }
}

#[async_trait]
impl MasterSource for StoredMaster {
    fn id(&self) -> MasterId {
        self.id
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    fn file_name(&self) -> &str {
        self.key.as_str()
    }

    async fn open_bytes(&self) -> Result<Vec<u8>, SourceError> {
        Ok(self.store.get(&self.key).await?)
    }
}

/// Read width and height from an encoded image without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), SourceError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| SourceError::Unreadable(e.to_string()))?
        .into_dimensions()
        .map_err(|e| SourceError::Unreadable(e.to_string()))
}
