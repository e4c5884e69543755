//! Raster decode / encode.

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::RenderError;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Decoded image plus the format it arrived in.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

/// Decode raw bytes, sniffing the format from the magic number.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, RenderError> {
    if bytes.is_empty() {
        return Err(RenderError::Decode("empty input".to_string()));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| RenderError::Decode(format!("unrecognized image format: {}", e)))?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| RenderError::Decode(e.to_string()))?;

    log::debug!(
        "[Codec] decoded {:?} {}x{} {:?}",
        format,
        image.width(),
        image.height(),
        image.color()
    );

    Ok(DecodedImage { image, format })
}

/// Encode `image` as `format`. `jpeg_quality` (1-100) applies to JPEG only.
pub fn encode_image(
    image: &DynamicImage,
    format: ImageFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, RenderError> {
    let mut cursor = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut cursor, jpeg_quality.clamp(1, 100));
            // JPEG carries 8-bit gray or RGB only
            let result = match image.color() {
                ColorType::L8 | ColorType::Rgb8 => image.write_with_encoder(encoder),
                _ => DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder),
            };
            result.map_err(|e| RenderError::Encode(e.to_string()))?;
        }
        _ => {
            image
                .write_to(&mut cursor, format)
                .map_err(|e| RenderError::Encode(e.to_string()))?;
        }
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample() -> DynamicImage {
        let mut img = RgbImage::new(8, 6);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([x as u8 * 30, y as u8 * 40, 7]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_png_keeps_pixels_and_format() {
        let bytes = encode_image(&sample(), ImageFormat::Png, DEFAULT_JPEG_QUALITY).unwrap();
        let decoded = decode_image(&bytes).unwrap();

        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!(decoded.image.as_bytes(), sample().as_bytes());
    }

    #[test]
    fn test_jpeg_encodes_alpha_images() {
        let rgba = DynamicImage::ImageRgba8(sample().to_rgba8());
        let bytes = encode_image(&rgba, ImageFormat::Jpeg, 80).unwrap();
        let decoded = decode_image(&bytes).unwrap();

        assert_eq!(decoded.format, ImageFormat::Jpeg);
        assert_eq!((decoded.image.width(), decoded.image.height()), (8, 6));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(decode_image(b""), Err(RenderError::Decode(_))));
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(RenderError::Decode(_))
        ));
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let bytes = encode_image(&sample(), ImageFormat::Png, DEFAULT_JPEG_QUALITY).unwrap();
        assert!(matches!(
            decode_image(&bytes[..bytes.len() / 2]),
            Err(RenderError::Decode(_))
        ));
    }
}
