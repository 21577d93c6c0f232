//! Image loading for OCR.

use ::image::DynamicImage;
use imgdex_core::RecognizeError;
use std::path::Path;
use tracing::debug;

/// Read and decode the image at `path`.
///
/// Decoding runs on the blocking pool.
pub async fn load_image(path: &Path) -> Result<DynamicImage, RecognizeError> {
    debug!("Loading image: {:?}", path);
    let bytes = tokio::fs::read(path).await?;

    tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(|e| RecognizeError::Join(e.to_string()))?
}

/// Decode in-memory image bytes, guessing the format from the content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, RecognizeError> {
    ::image::load_from_memory(bytes).map_err(|e| RecognizeError::Decode(e.to_string()))
}
