//! Cached, aspect-preserving renditions of master images.
//!
//! [`RenditionEngine`] maps a `(master, size)` request onto a single
//! [`DerivedAsset`], regenerating it when the master changed since the asset
//! was created or when its stored bytes went missing.

pub mod asset;
pub mod codec;
pub mod config;
pub mod database;
pub mod engine;
pub mod entity;
pub mod error;
pub mod events;
pub mod geometry;
pub mod lock;
pub mod repository;
pub mod service;
pub mod source;

pub use asset::{AssetKey, CanonicalSize, DerivedAsset, MasterId};
pub use engine::RenditionEngine;
pub use error::{RenditionError, RepositoryError};
pub use service::RenditionService;
pub use source::{MasterSource, StoredMaster};
