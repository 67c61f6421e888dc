use image::RgbaImage;

use crate::error::{OverlayError, Result};

/// Decoded raster, straight (non-premultiplied) RGBA8.
pub struct SourceImage {
    pixels: RgbaImage,
}

impl SourceImage {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let pixels = image::load_from_memory(bytes)?.to_rgba8();
        Self::from_rgba(pixels)
    }

    pub fn from_rgba(pixels: RgbaImage) -> Result<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(OverlayError::EmptyImage);
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// RGBA of the pixel at `(x, y)`; coordinates must be in bounds.
    pub fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let source = SourceImage::decode(&bytes).unwrap();
        assert_eq!((source.width(), source.height()), (3, 2));
        assert_eq!(source.rgba(2, 1), [1, 2, 3, 4]);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            SourceImage::decode(b"not an image"),
            Err(OverlayError::Decode(_))
        ));
    }

    #[test]
    fn test_empty_image_rejected() {
        assert!(matches!(
            SourceImage::from_rgba(RgbaImage::new(0, 5)),
            Err(OverlayError::EmptyImage)
        ));
    }
}
