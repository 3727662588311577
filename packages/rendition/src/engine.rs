//! Cache lookup and regeneration of renditions.
//!
//! A request for `(master, size)` is served from the repository when a fresh
//! asset with a storage location exists. Otherwise the engine serializes on
//! the key, deletes whatever stale or corrupt record is left, renders new
//! bytes and persists them. Unreadable masters yield `Ok(None)`; repository
//! failures are returned as errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use crate::asset::{AssetKey, AssetState, CanonicalSize, DerivedAsset, NewAsset, derived_file_name};
use crate::codec::{CodecError, ImageCodec};
use crate::config::EngineConfig;
use crate::error::{RenditionError, Result};
use crate::events::{EventSink, RenditionEvent};
use crate::geometry;
use crate::lock::KeyedLocks;
use crate::repository::AssetRepository;
use crate::source::{MasterSource, SourceError};

#[derive(Debug, Error)]
enum RenderError {
    #[error("{0}")]
    Source(#[from] SourceError),

    #[error("{0}")]
    Codec(#[from] CodecError),
}

#[derive(Clone)]
pub struct RenditionEngine {
    repository: Arc<dyn AssetRepository>,
    codec: Arc<dyn ImageCodec>,
    events: Arc<dyn EventSink>,
    locks: KeyedLocks,
    regenerate_timeout: Duration,
}

impl RenditionEngine {
    pub fn new(
        repository: Arc<dyn AssetRepository>,
        codec: Arc<dyn ImageCodec>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            repository,
            codec,
            events,
            locks: KeyedLocks::new(),
            regenerate_timeout: EngineConfig::default().regenerate_timeout(),
        }
    }

    /// Default bound on a single regeneration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.regenerate_timeout = timeout;
        self
    }

    /// Rendition of `master` fitting a `size` x `size` box.
    ///
    /// Returns `Ok(None)` when the master cannot be read or decoded, or when
    /// the resolved geometry has zero area. Geometry is only checked on a
    /// cache miss, so a valid cached asset is served even if the master's
    /// recorded dimensions have since become unusable.
    pub async fn get_rendition(
        &self,
        master: &dyn MasterSource,
        size: u32,
    ) -> Result<Option<DerivedAsset>> {
        self.get_rendition_with_timeout(master, size, self.regenerate_timeout)
            .await
    }

    /// Like [`get_rendition`](Self::get_rendition), bounding regeneration by
    /// `timeout` instead of the configured default.
    ///
    /// A timed-out regeneration never leaves a record behind.
    #[instrument(skip(self, master), fields(master_id = master.id()))]
    pub async fn get_rendition_with_timeout(
        &self,
        master: &dyn MasterSource,
        size: u32,
        timeout: Duration,
    ) -> Result<Option<DerivedAsset>> {
        let key = AssetKey::new(master.id(), size);

        if let Some(asset) = self.repository.find(key.parent_id, key.size).await?
            && asset.state(master.modified_at()) == AssetState::Valid
        {
            self.events.record(RenditionEvent::Hit {
                key,
                asset_id: asset.id,
            });
            return Ok(Some(asset));
        }

        tokio::time::timeout(timeout, self.regenerate(master, key))
            .await
            .map_err(|_| RenditionError::Timeout(timeout))?
    }

    pub async fn get_canonical(
        &self,
        master: &dyn MasterSource,
        size: CanonicalSize,
    ) -> Result<Option<DerivedAsset>> {
        self.get_rendition(master, size.pixels()).await
    }

    /// 64px rendition.
    pub async fn tiny(&self, master: &dyn MasterSource) -> Result<Option<DerivedAsset>> {
        self.get_canonical(master, CanonicalSize::Tiny).await
    }

    /// 128px rendition.
    pub async fn small(&self, master: &dyn MasterSource) -> Result<Option<DerivedAsset>> {
        self.get_canonical(master, CanonicalSize::Small).await
    }

    /// 256px rendition.
    pub async fn large(&self, master: &dyn MasterSource) -> Result<Option<DerivedAsset>> {
        self.get_canonical(master, CanonicalSize::Large).await
    }

    /// 384px rendition.
    pub async fn huge(&self, master: &dyn MasterSource) -> Result<Option<DerivedAsset>> {
        self.get_canonical(master, CanonicalSize::Huge).await
    }

    async fn regenerate(
        &self,
        master: &dyn MasterSource,
        key: AssetKey,
    ) -> Result<Option<DerivedAsset>> {
        let _guard = self.locks.acquire(key).await;

        // Another caller may have finished while we waited for the key.
        if let Some(asset) = self.repository.find(key.parent_id, key.size).await? {
            match asset.state(master.modified_at()) {
                AssetState::Valid => {
                    self.events.record(RenditionEvent::Hit {
                        key,
                        asset_id: asset.id,
                    });
                    return Ok(Some(asset));
                }
                AssetState::Stale => {
                    self.events.record(RenditionEvent::Stale {
                        key,
                        asset_id: asset.id,
                        created_at: asset.created_at,
                        modified_at: master.modified_at(),
                    });
                    self.repository.delete(&asset).await?;
                }
                AssetState::Corrupt => {
                    self.events.record(RenditionEvent::Corrupt {
                        key,
                        asset_id: asset.id,
                    });
                    self.repository.delete(&asset).await?;
                }
            }
        }

        let (width, height) = geometry::resolve(master.width(), master.height(), key.size)?;
        if width == 0 || height == 0 {
            self.events.record(RenditionEvent::Degenerate { key, width, height });
            return Ok(None);
        }

        let started = Instant::now();
        // Taken before reading, so a replace racing the render makes the
        // result stale instead of fresh.
        let read_at = Utc::now();
        let bytes = match self.render(master, width, height).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.events.record(RenditionEvent::SourceUnavailable {
                    key,
                    error: e.to_string(),
                });
                return Ok(None);
            }
        };

        let name = derived_file_name(width, height, master.file_name(), self.codec.extension());
        let asset = self
            .repository
            .create(NewAsset {
                parent_id: key.parent_id,
                size: key.size,
                width,
                height,
                name: name.clone(),
                bytes,
                created_at: read_at,
            })
            .await?;

        self.events.record(RenditionEvent::Regenerated {
            key,
            asset_id: asset.id,
            name,
            width,
            height,
            elapsed: started.elapsed(),
        });

        Ok(Some(asset))
    }

    /// Read, decode, resize and encode on the blocking pool.
    async fn render(
        &self,
        master: &dyn MasterSource,
        width: u32,
        height: u32,
    ) -> std::result::Result<Vec<u8>, RenderError> {
        let source = master.open_bytes().await?;
        let codec = Arc::clone(&self.codec);

        let encoded = tokio::task::spawn_blocking(move || {
            let raster = codec.decode(&source)?;
            let resized = codec.resize(&raster, width, height);
            codec.encode(&resized)
        })
        .await
        .map_err(|e| CodecError::Worker(e.to_string()))??;

        Ok(encoded)
    }
}
