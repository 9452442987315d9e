//! Saving captured frames to image files.

use std::path::Path;

use image::{ImageBuffer, Rgba};

use crate::backend::Frame;

/// Error type for screenshot operations.
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    /// Encoding or writing failed; `image` reports file I/O errors here too.
    #[error("image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid image data")]
    InvalidImageData,
}

fn to_image(frame: &Frame) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>, ScreenshotError> {
    // Frames are captured top row first, which matches the image crate.
    ImageBuffer::from_raw(frame.width, frame.height, frame.pixels.clone())
        .ok_or(ScreenshotError::InvalidImageData)
}

/// Writes `frame` to `path`. The format follows the extension (png, jpg, jpeg).
pub fn save_frame(path: impl AsRef<Path>, frame: &Frame) -> Result<(), ScreenshotError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let img = to_image(frame)?;
    match extension.as_str() {
        "png" => img.save_with_format(path, image::ImageFormat::Png)?,
        "jpg" | "jpeg" => {
            let rgb_img = image::DynamicImage::ImageRgba8(img).to_rgb8();
            rgb_img.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => return Err(ScreenshotError::UnsupportedFormat(extension)),
    }
    log::info!("saved {}x{} frame to {}", frame.width, frame.height, path.display());
    Ok(())
}

/// Encodes `frame` as PNG in memory.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, ScreenshotError> {
    let img = to_image(frame)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
