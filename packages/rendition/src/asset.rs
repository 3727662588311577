use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a master image.
pub type MasterId = i64;

/// Cache key of a rendition: one valid asset per (master, size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetKey {
    pub parent_id: MasterId,
    pub size: u32,
}

impl AssetKey {
    pub fn new(parent_id: MasterId, size: u32) -> Self {
        Self { parent_id, size }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}px", self.parent_id, self.size)
    }
}

/// Canonical rendition sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalSize {
    /// 64px
    Tiny,
    /// 128px
    Small,
    /// 256px
    Large,
    /// 384px
    Huge,
}

impl CanonicalSize {
    pub const ALL: [CanonicalSize; 4] = [Self::Tiny, Self::Small, Self::Large, Self::Huge];

    pub fn pixels(self) -> u32 {
        match self {
            Self::Tiny => 64,
            Self::Small => 128,
            Self::Large => 256,
            Self::Huge => 384,
        }
    }
}

/// How a cached asset relates to the current master image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Valid,
    /// Created before the master was last modified.
    Stale,
    /// No usable storage location.
    Corrupt,
}

/// A cached rendition of a master image.
///
/// Records are immutable; regeneration deletes and recreates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAsset {
    pub id: Uuid,
    pub parent_id: MasterId,
    /// Requested bounding-box size.
    pub size: u32,
    pub width: u32,
    pub height: u32,
    /// Derived file name, `__<W>x<H>__.<master basename>.<ext>`.
    pub name: String,
    pub storage_key: String,
    /// Public URL of the stored bytes. `None` once the bytes are gone.
    pub location: Option<String>,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub checksum: String,
    pub byte_size: u64,
    pub created_at: DateTime<Utc>,
}

impl DerivedAsset {
    pub fn key(&self) -> AssetKey {
        AssetKey::new(self.parent_id, self.size)
    }

    pub fn has_location(&self) -> bool {
        self.location
            .as_deref()
            .is_some_and(|location| !location.trim().is_empty())
    }

    /// Classify against the master's last modification time.
    ///
    /// Staleness wins over a missing location.
    pub fn state(&self, master_modified_at: DateTime<Utc>) -> AssetState {
        if self.created_at < master_modified_at {
            AssetState::Stale
        } else if !self.has_location() {
            AssetState::Corrupt
        } else {
            AssetState::Valid
        }
    }
}

impl fmt::Display for DerivedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}px]", self.parent_id, self.size)
    }
}

/// Everything the repository needs to persist a freshly rendered asset.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub parent_id: MasterId,
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub name: String,
    pub bytes: Vec<u8>,
    /// When the master bytes were read. Stored as the asset's creation time,
    /// so a master replaced mid-render leaves the asset stale.
    pub created_at: DateTime<Utc>,
}

/// Build the stored name of a rendition: `__<W>x<H>__.<basename>.<ext>`.
pub fn derived_file_name(width: u32, height: u32, master_file: &str, extension: &str) -> String {
    let basename = master_file.rsplit('/').next().unwrap_or(master_file);
    format!("__{width}x{height}__.{basename}.{extension}")
}
