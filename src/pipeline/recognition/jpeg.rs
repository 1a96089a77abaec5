//! Image checks and JPEG encoding for OCR input.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageOutputFormat};

use super::RecognitionError;

/// Maximum input image size (in bytes) before rejecting.
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024; // 20 MB

/// Smaller than any PNG/JPEG header plus one pixel.
const MIN_IMAGE_BYTES: usize = 24;

/// Quality used when re-encoding uploads for the remote service.
const JPEG_QUALITY: u8 = 90;

pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), RecognitionError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(RecognitionError::ImageProcessing(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(RecognitionError::ImageProcessing(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Serialize an image as JPEG bytes.
///
/// JPEG input is passed through untouched; anything else is decoded,
/// flattened to RGB (JPEG has no alpha) and re-encoded.
pub fn encode_jpeg(image_bytes: &[u8]) -> Result<Vec<u8>, RecognitionError> {
    validate_image_bytes(image_bytes)?;

    if matches!(image::guess_format(image_bytes), Ok(ImageFormat::Jpeg)) {
        return Ok(image_bytes.to_vec());
    }

    let img = image::load_from_memory(image_bytes).map_err(|e| {
        RecognitionError::ImageProcessing(format!("Failed to decode image: {e}"))
    })?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut cursor = Cursor::new(Vec::new());
    rgb.write_to(&mut cursor, ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(|e| RecognitionError::ImageProcessing(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
pub(crate) mod test_images {
    use std::io::Cursor;

    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

    /// Small gradient PNG; the gradient keeps it above the minimum size.
    pub fn gradient_png() -> Vec<u8> {
        let img = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 128]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }
}
