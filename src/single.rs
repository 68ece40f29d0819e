//! Captioning one image outside a batch. Failures go straight back to the
//! caller; there is no queue and no status tracking.

use crate::client::{CaptionResponse, CaptionService};
use crate::compress::{compress, CompressionOptions};
use crate::error::{CaptionError, Result};
use crate::constants::URL_IMAGE_LABEL;
use crate::intake::{display_name, read_image_file};
use crate::settings::CaptionSettings;
use std::path::Path;

/// Compresses `bytes` with the single-image preset and captions the result.
pub async fn caption_bytes<S: CaptionService + ?Sized>(
    service: &S,
    bytes: Vec<u8>,
    settings: &CaptionSettings,
) -> Result<CaptionResponse> {
    settings.validate()?;
    let payload = tokio::task::spawn_blocking(move || {
        compress(&bytes, &CompressionOptions::single_image())
    })
    .await
    .map_err(|e| CaptionError::Encode(format!("compression task failed: {}", e)))??;

    service
        .generate_caption(&payload.to_data_uri(), settings)
        .await
}

pub async fn caption_file<S: CaptionService + ?Sized>(
    service: &S,
    path: &Path,
    settings: &CaptionSettings,
) -> Result<CaptionResponse> {
    let bytes = read_image_file(path)?;
    caption_bytes(service, bytes, settings).await
}

/// Lets the service fetch the image itself; nothing is compressed locally.
pub async fn caption_url<S: CaptionService + ?Sized>(
    service: &S,
    url: &str,
    settings: &CaptionSettings,
) -> Result<CaptionResponse> {
    settings.validate()?;
    let url = url.trim();
    if url.is_empty() {
        return Err(CaptionError::InvalidSettings("image URL is empty".to_string()));
    }
    service.generate_caption_from_url(url, settings).await
}

/// Whether a CLI input should be treated as a remote image URL.
pub fn is_remote_url(input: &str) -> bool {
    let lower = input.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Display label for a CLI input: the file name, or a fixed label for URLs.
pub fn source_label(input: &str) -> String {
    if is_remote_url(input) {
        URL_IMAGE_LABEL.to_string()
    } else {
        display_name(Path::new(input))
    }
}
