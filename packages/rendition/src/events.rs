//! Structured events emitted by the rendition engine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::asset::AssetKey;

#[derive(Debug, Clone, PartialEq)]
pub enum RenditionEvent {
    /// A valid cached asset was served.
    Hit { key: AssetKey, asset_id: Uuid },
    /// The master changed after the asset was made; the asset was deleted.
    Stale {
        key: AssetKey,
        asset_id: Uuid,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    },
    /// The asset had no storage location; it was deleted.
    Corrupt { key: AssetKey, asset_id: Uuid },
    /// A new asset was rendered and persisted.
    Regenerated {
        key: AssetKey,
        asset_id: Uuid,
        name: String,
        width: u32,
        height: u32,
        elapsed: Duration,
    },
    /// The master could not be read, decoded or encoded.
    SourceUnavailable { key: AssetKey, error: String },
    /// The resolved geometry has zero area.
    Degenerate { key: AssetKey, width: u32, height: u32 },
}

impl RenditionEvent {
    pub fn key(&self) -> AssetKey {
        match self {
            Self::Hit { key, .. }
            | Self::Stale { key, .. }
            | Self::Corrupt { key, .. }
            | Self::Regenerated { key, .. }
            | Self::SourceUnavailable { key, .. }
            | Self::Degenerate { key, .. } => *key,
        }
    }
}

/// Receiver for engine events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: RenditionEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: RenditionEvent) {
        match event {
            RenditionEvent::Hit { key, asset_id } => {
                debug!(%key, %asset_id, "Serving cached rendition");
            }
            RenditionEvent::Stale {
                key,
                asset_id,
                created_at,
                modified_at,
            } => {
                info!(
                    %key,
                    %asset_id,
                    %created_at,
                    %modified_at,
                    "Master image replaced since rendition was created, regenerating"
                );
            }
            RenditionEvent::Corrupt { key, asset_id } => {
                info!(%key, %asset_id, "Rendition has no storage location, regenerating");
            }
            RenditionEvent::Regenerated {
                key,
                asset_id,
                name,
                width,
                height,
                elapsed,
            } => {
                info!(
                    %key,
                    %asset_id,
                    name = %name,
                    width,
                    height,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Rendition generated"
                );
            }
            RenditionEvent::SourceUnavailable { key, error } => {
                warn!(%key, error = %error, "Master image unavailable, no rendition produced");
            }
            RenditionEvent::Degenerate { key, width, height } => {
                warn!(%key, width, height, "Rendition geometry has zero area");
            }
        }
    }
}
