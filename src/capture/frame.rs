use bytes::Bytes;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

/// Decoded image with zero-copy sharing semantics
#[derive(Clone, Debug)]
pub struct Frame {
    /// Immutable interleaved pixel data - can be shared across threads without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: FrameMetadata,
}

/// Frame metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Pixel formats we support, all 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb24,
    Bgr24,
    Rgba32,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Rgba32 => 4,
        }
    }

    /// Format for an interleaved buffer with the given channel count.
    /// Three channels are assumed to be RGB.
    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::Gray8),
            3 => Some(PixelFormat::Rgb24),
            4 => Some(PixelFormat::Rgba32),
            _ => None,
        }
    }
}

impl Frame {
    /// Wrap raw interleaved pixels, checking the buffer matches the geometry.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let expected = width as usize * height as usize * format.channels();
        if width == 0 || height == 0 {
            return Err(VigilError::MalformedInput(format!(
                "empty frame geometry {width}x{height}"
            )));
        }
        if data.len() != expected {
            return Err(VigilError::MalformedInput(format!(
                "{width}x{height} {format:?} frame needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            meta: FrameMetadata {
                width,
                height,
                format,
            },
        })
    }

    /// Frame with every channel of every pixel set to `value`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, value: u8) -> Self {
        let len = width as usize * height as usize * format.channels();
        Self {
            data: Bytes::from(vec![value; len]),
            meta: FrameMetadata {
                width,
                height,
                format,
            },
        }
    }

    /// Convert a decoded image, keeping gray and alpha layouts and folding
    /// everything else (16-bit, float) down to RGB24.
    pub fn from_image(image: DynamicImage) -> Result<Self> {
        let (width, height) = (image.width(), image.height());
        match image {
            DynamicImage::ImageLuma8(buf) => Self::new(width, height, PixelFormat::Gray8, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => Self::new(width, height, PixelFormat::Rgba32, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => Self::new(width, height, PixelFormat::Rgb24, buf.into_raw()),
            other => Self::new(width, height, PixelFormat::Rgb24, other.to_rgb8().into_raw()),
        }
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn channels(&self) -> usize {
        self.meta.format.channels()
    }

    /// True when both frames share dimensions and channel layout.
    pub fn same_geometry(&self, other: &Frame) -> bool {
        self.meta == other.meta
    }
}
