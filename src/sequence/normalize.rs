use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Pixel, Rgb, Rgba};
use ndarray::ArrayViewMut3;

use crate::capture::{Frame, PixelFormat};
use crate::error::{Result, VigilError};

/// Largest value of an 8-bit channel
pub const CHANNEL_MAX: f32 = 255.0;

/// Resize `frame` to `slot`'s `(height, width, channels)` and write it scaled into `[0, 1]`.
pub fn write_normalized(frame: &Frame, mut slot: ArrayViewMut3<'_, f32>, filter: FilterType) -> Result<()> {
    let (height, width, channels) = slot.dim();
    if frame.channels() != channels {
        return Err(VigilError::MalformedInput(format!(
            "frame has {} channels, sequence expects {channels}",
            frame.channels()
        )));
    }

    let pixels = resize(frame, width as u32, height as u32, filter)?;
    if pixels.len() != slot.len() {
        return Err(VigilError::MalformedInput(format!(
            "resized frame has {} values, expected {}",
            pixels.len(),
            slot.len()
        )));
    }
    for (dst, &src) in slot.iter_mut().zip(pixels.iter()) {
        *dst = f32::from(src) / CHANNEL_MAX;
    }
    Ok(())
}

/// Interleaved 8-bit pixels of `frame` at `width` x `height`.
pub fn resize(frame: &Frame, width: u32, height: u32, filter: FilterType) -> Result<Vec<u8>> {
    if frame.width() == width && frame.height() == height {
        return Ok(frame.data.to_vec());
    }
    match frame.meta.format {
        PixelFormat::Gray8 => resize_as::<Luma<u8>>(frame, width, height, filter),
        // channel order does not matter to the resampler
        PixelFormat::Rgb24 | PixelFormat::Bgr24 => resize_as::<Rgb<u8>>(frame, width, height, filter),
        PixelFormat::Rgba32 => resize_as::<Rgba<u8>>(frame, width, height, filter),
    }
}

fn resize_as<P>(frame: &Frame, width: u32, height: u32, filter: FilterType) -> Result<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let view = ImageBuffer::<P, &[u8]>::from_raw(frame.width(), frame.height(), &frame.data[..])
        .ok_or_else(|| {
            VigilError::MalformedInput(format!(
                "{} bytes do not hold a {}x{} image",
                frame.data.len(),
                frame.width(),
                frame.height()
            ))
        })?;
    Ok(imageops::resize(&view, width, height, filter).into_raw())
}
