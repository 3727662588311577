//! Decode, resize and encode capability used to produce renditions.
//!
//! The engine only depends on [`ImageCodec`]; [`ImageRsCodec`] is the
//! production implementation backed by the `image` crate.

mod image_codec;

pub use image_codec::ImageRsCodec;

use thiserror::Error;

/// Decoded pixel data passed between codec stages.
pub type Raster = image::DynamicImage;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Codec worker failed: {0}")]
    Worker(String),
}

/// Image codec contract.
///
/// Calls are CPU-bound and synchronous; callers run them off the async
/// executor.
pub trait ImageCodec: Send + Sync {
    /// Decode encoded image bytes. Fails on malformed or unsupported input.
    fn decode(&self, bytes: &[u8]) -> Result<Raster, CodecError>;

    /// Resample to exactly `width` x `height` with an antialiasing filter.
    fn resize(&self, raster: &Raster, width: u32, height: u32) -> Raster;

    /// Encode in the codec's fixed output format.
    fn encode(&self, raster: &Raster) -> Result<Vec<u8>, CodecError>;

    /// File extension of the output format, without the dot.
    fn extension(&self) -> &'static str;
}
