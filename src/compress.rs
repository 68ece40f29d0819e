use crate::constants::{
    BATCH_INITIAL_QUALITY, BATCH_MAX_DIMENSION, MAX_QUALITY, MIN_QUALITY, QUALITY_STEP,
    SINGLE_BYTE_BUDGET, SINGLE_INITIAL_QUALITY, SINGLE_MAX_DIMENSION,
};
use crate::error::{CaptionError, Result};
use crate::intake::read_image_file;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Longest-edge ceiling in pixels.
    pub max_dimension: u32,
    /// First JPEG quality tried, as a percentage.
    pub initial_quality: u8,
    /// Best-effort ceiling on the transmitted (data URI) length.
    pub byte_budget: Option<usize>,
}

impl CompressionOptions {
    pub fn new(max_dimension: u32, initial_quality: u8, byte_budget: Option<usize>) -> Result<Self> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&initial_quality) {
            return Err(CaptionError::InvalidQuality(initial_quality));
        }
        if max_dimension == 0 {
            return Err(CaptionError::InvalidSettings(
                "max dimension must be positive".to_string(),
            ));
        }

        Ok(Self {
            max_dimension,
            initial_quality,
            byte_budget,
        })
    }

    /// Preset used when captioning a single image.
    pub fn single_image() -> Self {
        Self {
            max_dimension: SINGLE_MAX_DIMENSION,
            initial_quality: SINGLE_INITIAL_QUALITY,
            byte_budget: Some(SINGLE_BYTE_BUDGET),
        }
    }

    /// Preset used for batch items. No budget, so a single encode.
    pub fn batch() -> Self {
        Self {
            max_dimension: BATCH_MAX_DIMENSION,
            initial_quality: BATCH_INITIAL_QUALITY,
            byte_budget: None,
        }
    }

    pub fn with_byte_budget(mut self, byte_budget: Option<usize>) -> Self {
        self.byte_budget = byte_budget;
        self
    }
}

/// Decode, resize and encode primitives the compressor is built on.
///
/// Any image library can stand behind this; [`JpegCodec`] is the default.
pub trait ImageCodec {
    type Image;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Image>;
    fn dimensions(&self, image: &Self::Image) -> (u32, u32);
    fn resize(&self, image: &Self::Image, width: u32, height: u32) -> Self::Image;
    fn encode_at_quality(&self, image: &Self::Image, quality: u8) -> Result<Vec<u8>>;
    fn mime_type(&self) -> &'static str;
}

/// JPEG re-encoding on top of the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(CaptionError::Decode)
    }

    fn dimensions(&self, image: &DynamicImage) -> (u32, u32) {
        image.dimensions()
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn encode_at_quality(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        // JPEG has no alpha channel
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality)
            .encode_image(&rgb)
            .map_err(|e| CaptionError::Encode(e.to_string()))?;
        Ok(buffer)
    }

    fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub encode_attempts: u8,
}

impl EncodedPayload {
    /// The representation sent to the caption service.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            BASE64_STANDARD.encode(&self.bytes)
        )
    }

    pub fn transmitted_len(&self) -> usize {
        data_uri_len(self.mime_type, self.bytes.len())
    }
}

/// Length of `data:<mime>;base64,<payload>` without building the string.
pub fn data_uri_len(mime_type: &str, byte_len: usize) -> usize {
    "data:".len() + mime_type.len() + ";base64,".len() + byte_len.div_ceil(3) * 4
}

/// Uniformly scales `(width, height)` so the longest edge fits `max_dimension`.
/// Never upscales. A zero ceiling is treated as one pixel.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }

    let scale = max_dimension as f64 / longest as f64;
    let scaled_width = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let scaled_height = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    (scaled_width, scaled_height)
}

pub fn compress(bytes: &[u8], options: &CompressionOptions) -> Result<EncodedPayload> {
    compress_with(&JpegCodec, bytes, options)
}

/// Re-encodes `bytes` under the dimension ceiling, stepping quality down by
/// [`QUALITY_STEP`] while the payload is over budget and above [`MIN_QUALITY`].
///
/// The smallest encoding seen wins, so reported sizes never grow. Floor
/// quality is accepted even when it is still over budget.
pub fn compress_with<C: ImageCodec>(
    codec: &C,
    bytes: &[u8],
    options: &CompressionOptions,
) -> Result<EncodedPayload> {
    let decoded = codec.decode(bytes)?;
    let (width, height) = codec.dimensions(&decoded);
    let (target_width, target_height) = scaled_dimensions(width, height, options.max_dimension);

    let image = if (target_width, target_height) != (width, height) {
        debug!(
            width,
            height, target_width, target_height, "downscaling before encode"
        );
        codec.resize(&decoded, target_width, target_height)
    } else {
        decoded
    };

    let mime_type = codec.mime_type();
    let mut quality = options.initial_quality;
    let mut encode_attempts = 1u8;
    let mut best = codec.encode_at_quality(&image, quality)?;
    let mut best_quality = quality;

    if let Some(budget) = options.byte_budget {
        while data_uri_len(mime_type, best.len()) > budget && quality > MIN_QUALITY {
            quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
            let candidate = codec.encode_at_quality(&image, quality)?;
            encode_attempts += 1;
            debug!(quality, size = candidate.len(), budget, "re-encoded over budget");

            if candidate.len() <= best.len() {
                best = candidate;
                best_quality = quality;
            }
        }
    }

    Ok(EncodedPayload {
        bytes: best,
        mime_type,
        width: target_width,
        height: target_height,
        quality: best_quality,
        encode_attempts,
    })
}

/// Compresses a file on disk and writes the payload to `output`.
///
/// # Returns
/// * `Ok((original_size, payload))` - Source size in bytes and the written payload
pub fn compress_file(
    input: &Path,
    output: &Path,
    options: &CompressionOptions,
) -> Result<(u64, EncodedPayload)> {
    let bytes = read_image_file(input)?;
    let payload = compress(&bytes, options)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &payload.bytes)?;

    Ok((bytes.len() as u64, payload))
}
