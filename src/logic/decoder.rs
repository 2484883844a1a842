//! Image Decoder
//!
//! Turns an opaque request body into a model-ready RGB tensor.
//! Format is sniffed from the bytes; the declared content type is only a hint.

use std::str::FromStr;

use image::{imageops::FilterType, ImageFormat};
use ndarray::Array4;

use crate::error::DecodeError;

/// Channels fed to the classifier
pub const CHANNELS: usize = 3;

/// Memory layout of the input tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nchw" => Ok(TensorLayout::Nchw),
            "nhwc" => Ok(TensorLayout::Nhwc),
            other => Err(format!("unknown tensor layout: {}", other)),
        }
    }
}

/// Decoded, resized RGB image with channels scaled to `[0, 1]`
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub tensor: Array4<f32>,
    pub source_format: ImageFormat,
}

/// Stateless decoder, cheap to clone into blocking tasks
#[derive(Debug, Clone, Copy)]
pub struct ImageDecoder {
    size: u32,
    layout: TensorLayout,
}

impl ImageDecoder {
    pub fn new(size: u32, layout: TensorLayout) -> Self {
        Self { size: size.max(1), layout }
    }

    pub fn decode(&self, bytes: &[u8], content_type: Option<&str>) -> Result<NormalizedImage, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let format = image::guess_format(bytes).map_err(|_| DecodeError::UnsupportedFormat)?;

        if let Some(declared) = content_type {
            if !declared_matches(declared, format) {
                tracing::debug!(
                    declared = %declared,
                    detected = ?format,
                    "Declared content type does not match image bytes"
                );
            }
        }

        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| DecodeError::Corrupt(e.to_string()))?;

        let rgb = image::imageops::resize(&image.to_rgb8(), self.size, self.size, FilterType::Triangle);

        let side = self.size as usize;
        let shape = match self.layout {
            TensorLayout::Nchw => (1, CHANNELS, side, side),
            TensorLayout::Nhwc => (1, side, side, CHANNELS),
        };

        let mut tensor = Array4::<f32>::zeros(shape);
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..CHANNELS {
                let value = f32::from(pixel.0[c]) / 255.0;
                match self.layout {
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                }
            }
        }

        Ok(NormalizedImage { tensor, source_format: format })
    }
}

/// Compare an `image/*` content type against the sniffed format.
/// Non-image declarations are treated as matching (no hint given).
fn declared_matches(content_type: &str, format: ImageFormat) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let Some(subtype) = mime.strip_prefix("image/") else {
        return true;
    };

    match subtype {
        "jpeg" | "jpg" | "pjpeg" => format == ImageFormat::Jpeg,
        "png" => format == ImageFormat::Png,
        "webp" => format == ImageFormat::WebP,
        "bmp" | "x-ms-bmp" => format == ImageFormat::Bmp,
        "gif" => format == ImageFormat::Gif,
        _ => false,
    }
}
