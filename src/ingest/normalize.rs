use anyhow::{anyhow, Result};

use crate::frame::{Frame, PixelFormat};

/// Buffer layouts a capture device may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DeviceFormat {
    Rgb24,
    Yuyv,
    Grey,
}

impl DeviceFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Result<Self> {
        match fourcc {
            b"RGB3" => Ok(DeviceFormat::Rgb24),
            b"YUYV" => Ok(DeviceFormat::Yuyv),
            b"GREY" => Ok(DeviceFormat::Grey),
            other => Err(anyhow!(
                "unsupported capture format {}",
                String::from_utf8_lossy(other)
            )),
        }
    }
}

/// Copy a device buffer into a [`Frame`]. YUYV keeps only the luma samples,
/// which is all the motion estimator reads.
pub(crate) fn frame_from_device(
    buf: &[u8],
    width: u32,
    height: u32,
    format: DeviceFormat,
) -> Result<Frame> {
    let pixels = width
        .checked_mul(height)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))? as usize;
    match format {
        DeviceFormat::Rgb24 => {
            let expected = pixels * 3;
            let data = buf
                .get(..expected)
                .ok_or_else(|| length_mismatch("RGB", expected, buf.len()))?;
            Frame::new(data.to_vec(), width, height, PixelFormat::Rgb8)
        }
        DeviceFormat::Yuyv => {
            let expected = pixels * 2;
            let data = buf
                .get(..expected)
                .ok_or_else(|| length_mismatch("YUYV", expected, buf.len()))?;
            let luma = data.iter().step_by(2).copied().collect();
            Frame::new(luma, width, height, PixelFormat::Gray8)
        }
        DeviceFormat::Grey => {
            let data = buf
                .get(..pixels)
                .ok_or_else(|| length_mismatch("GREY", pixels, buf.len()))?;
            Frame::new(data.to_vec(), width, height, PixelFormat::Gray8)
        }
    }
}

fn length_mismatch(kind: &str, expected: usize, got: usize) -> anyhow::Error {
    anyhow!(
        "{} frame length mismatch: expected at least {}, got {}",
        kind,
        expected,
        got
    )
}
