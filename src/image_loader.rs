use std::path::{Path, PathBuf};

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder as _, ImageReader};
use thiserror::Error;

use crate::models::ImageSize;

/// Estimated bytes per pixel for RGBA buffers.
const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read image {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path:?}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A fully decoded RGBA image.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.len()
    }

    /// Builds a solid black image, mostly useful for tests and placeholders.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Turns a path into pixels. Implementations must be callable from the
/// prefetch worker thread.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError>;
}

/// Decoder backed by the `image` crate. Applies EXIF orientation so the
/// reported dimensions match what the user sees.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError> {
        let img = open_image(path)?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(DecodedImage {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

pub fn open_image(path: &Path) -> Result<DynamicImage, DecodeError> {
    let image_err = |source| DecodeError::Image {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| DecodeError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut decoder = reader.into_decoder().map_err(image_err)?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(image_err)?;
    img.apply_orientation(orientation);
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use tempfile::tempdir;

    #[test]
    fn test_decode_png_reports_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.PNG");
        RgbImage::new(6, 4)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let decoded = ImageCrateDecoder.decode(&path).unwrap();
        assert_eq!(decoded.size(), ImageSize::new(6, 4));
        assert_eq!(decoded.memory_bytes(), 6 * 4 * BYTES_PER_PIXEL);
    }

    #[test]
    fn test_decode_jpeg() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        RgbImage::new(8, 8)
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();

        let decoded = ImageCrateDecoder.decode(&path).unwrap();
        assert_eq!(decoded.size(), ImageSize::new(8, 8));
    }

    #[test]
    fn test_decode_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let err = ImageCrateDecoder
            .decode(&dir.path().join("missing.jpg"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Read { .. }));
    }

    #[test]
    fn test_decode_garbage_is_image_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        let err = ImageCrateDecoder.decode(&path).unwrap_err();
        assert!(matches!(err, DecodeError::Image { .. }));
    }

    #[test]
    fn test_blank_image_size() {
        let img = DecodedImage::blank(3, 2);
        assert_eq!(img.memory_bytes(), 24);
    }
}
