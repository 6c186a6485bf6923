use std::io::Cursor;

use image::{
    codecs::jpeg::JpegEncoder, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader,
};
use shared::error::EditError;

/// Reads the dimensions out of an encoded image without decoding
/// pixel data.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), EditError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| EditError::InvalidImage)?
        .into_dimensions()
        .map_err(|_| EditError::InvalidImage)
}

/// Ensures the artifact is JPEG, the fixed output encoding. Artifacts
/// the service already returned as JPEG pass through untouched; any
/// other decodable format is re-encoded.
pub fn normalize_jpeg(bytes: Vec<u8>) -> Result<Vec<u8>, EditError> {
    let reader = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| EditError::Delivery(format!("unreadable artifact: {e}")))?;

    match reader.format() {
        Some(ImageFormat::Jpeg) => Ok(bytes),
        Some(_) => {
            let decoded = reader
                .decode()
                .map_err(|e| EditError::Delivery(format!("artifact failed to decode: {e}")))?;
            // JPEG has no alpha channel.
            let rgb = decoded.to_rgb8();
            let mut out = Vec::new();
            JpegEncoder::new(&mut out)
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                .map_err(|e| EditError::Delivery(format!("jpeg re-encode failed: {e}")))?;
            Ok(out)
        }
        None => Err(EditError::Delivery(
            "artifact is not a recognizable image".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageEncoder;

    fn encode(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([180, 90, 30]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), format)
            .expect("encode fixture");
        out
    }

    #[test]
    fn probes_dimensions_without_full_decode() {
        let png = encode(ImageFormat::Png, 1200, 800);
        assert_eq!(probe_dimensions(&png).expect("dims"), (1200, 800));
    }

    #[test]
    fn garbage_bytes_are_invalid() {
        assert!(matches!(
            probe_dimensions(b"definitely not an image"),
            Err(EditError::InvalidImage)
        ));
    }

    #[test]
    fn jpeg_artifacts_pass_through_unchanged() {
        let jpeg = encode(ImageFormat::Jpeg, 64, 48);
        let out = normalize_jpeg(jpeg.clone()).expect("normalize");
        assert_eq!(out, jpeg);
    }

    #[test]
    fn png_artifacts_are_reencoded_to_jpeg() {
        let png = encode(ImageFormat::Png, 64, 48);
        let out = normalize_jpeg(png).expect("normalize");
        let format = ImageReader::new(Cursor::new(&out))
            .with_guessed_format()
            .expect("guess")
            .format();
        assert_eq!(format, Some(ImageFormat::Jpeg));
        // Re-encode must retain dimensions.
        assert_eq!(probe_dimensions(&out).expect("dims"), (64, 48));
    }

    #[test]
    fn rgba_artifacts_lose_alpha_but_reencode() {
        let img = image::RgbaImage::from_pixel(32, 32, image::Rgba([10, 20, 30, 128]));
        let mut png = Vec::new();
        image::codecs::png::PngEncoder::new(&mut png)
            .write_image(img.as_raw(), 32, 32, ExtendedColorType::Rgba8)
            .expect("encode rgba");

        let out = normalize_jpeg(png).expect("normalize");
        assert_eq!(probe_dimensions(&out).expect("dims"), (32, 32));
    }

    #[test]
    fn undecodable_artifact_is_a_delivery_error() {
        assert!(matches!(
            normalize_jpeg(b"not an image".to_vec()),
            Err(EditError::Delivery(_))
        ));
    }
}
