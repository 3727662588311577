use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use super::{CodecError, ImageCodec, Raster};
use crate::config::{ImageOptions, OutputFormat};

/// [`ImageCodec`] backed by the `image` crate.
///
/// Resizing uses Lanczos3. Output is written in the configured format and
/// quality; JPEG drops any alpha channel.
#[derive(Debug, Clone)]
pub struct ImageRsCodec {
    format: OutputFormat,
    quality: u8,
}

impl ImageRsCodec {
    pub fn new(options: &ImageOptions) -> Self {
        Self {
            format: options.output_format,
            quality: options.quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for ImageRsCodec {
    fn default() -> Self {
        Self::new(&ImageOptions::default())
    }
}

impl ImageCodec for ImageRsCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Raster, CodecError> {
        image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn resize(&self, raster: &Raster, width: u32, height: u32) -> Raster {
        raster.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn encode(&self, raster: &Raster) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        match self.format {
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(raster.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
                rgb.write_with_encoder(encoder)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            }
        }
        Ok(buf)
    }

    fn extension(&self) -> &'static str {
        self.format.extension()
    }
}
