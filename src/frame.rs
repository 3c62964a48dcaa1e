//! In-memory camera frames.
//!
//! A `Frame` lives for a single tick: the source produces it, the motion
//! estimator reads it, and it is dropped before the next capture.

use anyhow::{anyhow, Result};

/// Pixel layout of a frame's data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit RGB, 3 bytes per pixel.
    Rgb8,
    /// 8-bit luma, 1 byte per pixel.
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// One captured image. The buffer length always matches the dimensions.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Frame {
    /// Wrap `data`, checking its length against `width`, `height` and `format`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer is {} bytes, expected {} for {}x{} {:?}",
                data.len(),
                expected,
                width,
                height,
                format
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Luma plane (BT.601 weights, fixed point).
    pub fn to_gray(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Gray8 => self.data.clone(),
            PixelFormat::Rgb8 => self
                .data
                .chunks_exact(3)
                .map(|px| {
                    let luma = 77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32;
                    (luma >> 8) as u8
                })
                .collect(),
        }
    }
}
