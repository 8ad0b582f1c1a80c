use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::trace;

use super::frame::{Frame, PixelFormat};
use crate::error::{Result, VigilError};

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Decode a frame as it arrives on the wire: base64, optionally wrapped in a
/// `data:<mime>;base64,` URL.
pub fn decode_data_url(payload: &str) -> Result<Frame> {
    let encoded = match payload.split_once(',') {
        Some((_, body)) => body,
        None => payload,
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| VigilError::InvalidBase64(e.to_string()))?;
    decode_frame(&bytes)
}

/// Decode an encoded image (JPEG, PNG) into a [`Frame`].
pub fn decode_frame(data: &[u8]) -> Result<Frame> {
    if cfg!(feature = "fast-jpeg") && data.starts_with(&JPEG_MAGIC) {
        return decode_jpeg(data);
    }
    let image = image::load_from_memory(data).map_err(|e| VigilError::InvalidImage(e.to_string()))?;
    Frame::from_image(image)
}

fn decode_jpeg(data: &[u8]) -> Result<Frame> {
    let mut decoder = zune_jpeg::JpegDecoder::new(data);
    let pixels = decoder
        .decode()
        .map_err(|e| VigilError::InvalidImage(format!("{e:?}")))?;
    let info = decoder
        .info()
        .ok_or_else(|| VigilError::InvalidImage("jpeg header missing".into()))?;
    let (width, height) = (u32::from(info.width), u32::from(info.height));
    let area = width as usize * height as usize;
    if area == 0 || pixels.len() % area != 0 {
        return Err(VigilError::InvalidImage(format!(
            "jpeg decoded to {} bytes for {width}x{height}",
            pixels.len()
        )));
    }
    let format = PixelFormat::from_channels(pixels.len() / area).ok_or_else(|| {
        VigilError::InvalidImage(format!("unsupported jpeg channel count {}", pixels.len() / area))
    })?;
    trace!(width, height, ?format, "decoded jpeg frame");
    Frame::new(width, height, format, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 8, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_data_url() {
        let url = format!("data:image/png;base64,{}", STANDARD.encode(encoded(ImageFormat::Png)));
        let frame = decode_data_url(&url).unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 8));
        assert_eq!(frame.meta.format, PixelFormat::Rgb24);
    }

    #[test]
    fn decodes_bare_jpeg_base64() {
        let frame = decode_data_url(&STANDARD.encode(encoded(ImageFormat::Jpeg))).unwrap();
        assert_eq!((frame.width(), frame.height(), frame.channels()), (16, 8, 3));
    }

    #[test]
    fn rejects_non_base64() {
        let err = decode_data_url("it-is-not-base64-encoding-form").unwrap_err();
        assert_eq!(err.code(), "invalid_base64");
    }

    #[test]
    fn rejects_non_image_payload() {
        let url = format!("data:image/jpeg;base64,{}", STANDARD.encode(b"it is not an image"));
        let err = decode_data_url(&url).unwrap_err();
        assert_eq!(err.code(), "invalid_image");
    }
}
