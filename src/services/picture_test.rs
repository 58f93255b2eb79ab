use super::*;

use image::{DynamicImage, GenericImageView, RgbImage, RgbaImage};

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

fn png(width: u32, height: u32) -> Vec<u8> {
    encode(&DynamicImage::ImageRgba8(RgbaImage::new(width, height)), ImageFormat::Png)
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(RgbImage::new(width, height)), ImageFormat::Jpeg)
}

#[test]
fn allowed_format_accepts_png_and_jpeg() {
    assert_eq!(allowed_format(&png(2, 2)).unwrap().1, "png");
    assert_eq!(allowed_format(&jpeg(2, 2)).unwrap().1, "jpg");
}

#[test]
fn allowed_format_rejects_other_bytes() {
    assert!(matches!(allowed_format(b"GIF89a...."), Err(PictureError::UnsupportedFormat)));
    assert!(matches!(allowed_format(b"plain text"), Err(PictureError::UnsupportedFormat)));
}

#[test]
fn thumbnail_shrinks_large_png_keeping_aspect() {
    let (bytes, ext) = thumbnail(&png(500, 200)).unwrap();
    assert_eq!(ext, "png");
    let out = image::load_from_memory(&bytes).unwrap();
    assert_eq!(out.dimensions(), (125, 50));
}

#[test]
fn thumbnail_shrinks_jpeg() {
    let (bytes, ext) = thumbnail(&jpeg(300, 300)).unwrap();
    assert_eq!(ext, "jpg");
    let out = image::load_from_memory(&bytes).unwrap();
    assert_eq!(out.dimensions(), (125, 125));
}

#[test]
fn thumbnail_keeps_small_images() {
    let (bytes, _) = thumbnail(&png(40, 30)).unwrap();
    let out = image::load_from_memory(&bytes).unwrap();
    assert_eq!(out.dimensions(), (40, 30));
}

#[test]
fn thumbnail_rejects_empty_and_oversized() {
    assert!(matches!(thumbnail(&[]), Err(PictureError::Empty)));
    let huge = vec![0u8; MAX_UPLOAD_BYTES + 1];
    assert!(matches!(thumbnail(&huge), Err(PictureError::TooLarge)));
}

#[test]
fn thumbnail_rejects_truncated_png() {
    let mut bytes = png(50, 50);
    bytes.truncate(20);
    assert!(matches!(thumbnail(&bytes), Err(PictureError::Decode(_))));
}

#[test]
fn random_filename_shape() {
    let name = random_filename("png");
    assert_eq!(name.len(), 16 + 4);
    assert!(name.ends_with(".png"));
    assert_ne!(random_filename("png"), name);
}

#[tokio::test]
async fn save_picture_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("profile_pics");
    let filename = save_picture(&target, png(200, 200)).await.unwrap();
    let stored = std::fs::read(target.join(&filename)).unwrap();
    assert_eq!(image::load_from_memory(&stored).unwrap().dimensions(), (125, 125));
}

#[test]
fn default_picture_is_created_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = ensure_default_picture(dir.path()).unwrap();
    assert!(path.ends_with("default.jpg"));
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(allowed_format(&bytes).unwrap().1, "jpg");

    std::fs::write(&path, b"custom").unwrap();
    ensure_default_picture(dir.path()).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"custom");
}
