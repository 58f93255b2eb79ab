//! Profile pictures.
//!
//! Uploads are sniffed from their bytes (JPEG and PNG only), shrunk to fit
//! within 125x125 keeping the aspect ratio, and written under a random
//! 16-hex-character name so uploads never collide or overwrite each other.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use rand::Rng;

use crate::services::session::bytes_to_hex;

pub const THUMBNAIL_SIZE: u32 = 125;
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum PictureError {
    #[error("empty upload")]
    Empty,
    #[error("upload exceeds {MAX_UPLOAD_BYTES} bytes")]
    TooLarge,
    #[error("only jpg and png images are allowed")]
    UnsupportedFormat,
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image write failed: {0}")]
    Io(String),
}

/// Detect an allowed format and return it with its canonical file extension.
///
/// # Errors
///
/// `UnsupportedFormat` for anything other than JPEG or PNG.
pub fn allowed_format(bytes: &[u8]) -> Result<(ImageFormat, &'static str), PictureError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Ok((ImageFormat::Jpeg, "jpg")),
        Ok(ImageFormat::Png) => Ok((ImageFormat::Png, "png")),
        _ => Err(PictureError::UnsupportedFormat),
    }
}

#[must_use]
pub fn random_filename(extension: &str) -> String {
    let bytes: [u8; 8] = rand::rng().random();
    format!("{}.{extension}", bytes_to_hex(&bytes))
}

/// Decode, thumbnail, and encode an upload. Returns the encoded bytes and extension.
///
/// # Errors
///
/// Fails for empty, oversized, undecodable, or non-JPEG/PNG input.
pub fn thumbnail(bytes: &[u8]) -> Result<(Vec<u8>, &'static str), PictureError> {
    if bytes.is_empty() {
        return Err(PictureError::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(PictureError::TooLarge);
    }
    let (format, extension) = allowed_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| PictureError::Decode(e.to_string()))?;
    let thumb = if img.width() > THUMBNAIL_SIZE || img.height() > THUMBNAIL_SIZE {
        img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
    } else {
        img
    };
    let thumb = match format {
        // JPEG has no alpha channel.
        ImageFormat::Jpeg => image::DynamicImage::ImageRgb8(thumb.to_rgb8()),
        _ => thumb,
    };

    let mut out = Cursor::new(Vec::new());
    thumb
        .write_to(&mut out, format)
        .map_err(|e| PictureError::Io(e.to_string()))?;
    Ok((out.into_inner(), extension))
}

/// Thumbnail an upload and store it in `dir`. Returns the new filename.
///
/// Runs the CPU-bound work on the blocking pool.
///
/// # Errors
///
/// Any `thumbnail` failure, or `Io` if the directory cannot be written.
pub async fn save_picture(dir: &Path, bytes: Vec<u8>) -> Result<String, PictureError> {
    let dir: PathBuf = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let (encoded, extension) = thumbnail(&bytes)?;
        std::fs::create_dir_all(&dir).map_err(|e| PictureError::Io(e.to_string()))?;
        let filename = random_filename(extension);
        std::fs::write(dir.join(&filename), encoded).map_err(|e| PictureError::Io(e.to_string()))?;
        Ok(filename)
    })
    .await
    .map_err(|e| PictureError::Io(e.to_string()))?
}

/// Write a neutral placeholder as `default.jpg` if the directory lacks one.
///
/// # Errors
///
/// `Io` if the directory or file cannot be created.
pub fn ensure_default_picture(dir: &Path) -> Result<PathBuf, PictureError> {
    let path = dir.join(crate::services::account::DEFAULT_IMAGE_FILE);
    if path.is_file() {
        return Ok(path);
    }
    std::fs::create_dir_all(dir).map_err(|e| PictureError::Io(e.to_string()))?;
    let placeholder = image::RgbImage::from_pixel(THUMBNAIL_SIZE, THUMBNAIL_SIZE, image::Rgb([200, 206, 214]));
    placeholder
        .save_with_format(&path, ImageFormat::Jpeg)
        .map_err(|e| PictureError::Io(e.to_string()))?;
    tracing::info!(path = %path.display(), "wrote default profile picture");
    Ok(path)
}

#[cfg(test)]
#[path = "picture_test.rs"]
mod tests;
