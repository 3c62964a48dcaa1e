//! V4L2 camera source.
//!
//! Opens a local device node (e.g. `/dev/video0`), requests 640x480 RGB and
//! falls back to whatever layout the driver insists on (YUYV or GREY are
//! handled). `connect` performs a test capture so an unusable camera fails at
//! startup rather than on the first tick.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{frame_from_device, DeviceFormat};
use super::{FrameSource, SourceStats};
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct V4l2Config {
    pub name: String,
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Capture rate requested from the driver.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            name: "Webcam".to_string(),
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    frame_count: u64,
    read_failures: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    active_format: DeviceFormat,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            active_format: DeviceFormat::Rgb24,
            config,
            state: None,
            frame_count: 0,
            read_failures: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        log::info!(
            "connecting to camera {} ({})...",
            self.config.device,
            self.config.name
        );
        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        self.active_format = DeviceFormat::from_fourcc(&format.fourcc.repr)?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("failed to set fps on {}: {}", self.config.device, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.active_width, self.active_height, self.active_format);
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("camera {} not connected", self.config.device))?;
        state.with_mut(|fields| {
            let (buf, _meta) = fields.stream.next().context("capture v4l2 frame")?;
            frame_from_device(buf, width, height, format)
        })
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn connect(&mut self) -> Result<()> {
        if let Err(err) = self.open() {
            self.last_error = Some(err.to_string());
            return Err(err);
        }
        let test = self.capture().map_err(|err| {
            self.last_error = Some(err.to_string());
            self.state = None;
            err.context("camera opened but cannot read frames")
        })?;
        self.last_error = None;
        log::info!("connected to {}", self.config.name);
        log::info!("  resolution: {}x{}", test.width, test.height);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match self.capture() {
            Ok(frame) => {
                self.frame_count += 1;
                self.last_frame_at = Some(Instant::now());
                self.last_error = None;
                Ok(frame)
            }
            Err(err) => {
                self.read_failures += 1;
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        if self.state.is_none() || self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            read_failures: self.read_failures,
            source: self.config.device.clone(),
        }
    }

    fn disconnect(&mut self) {
        if self.state.take().is_some() {
            log::info!("disconnected from {}", self.config.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fails_to_connect() {
        let mut source = V4l2Source::new(V4l2Config {
            device: "/dev/does-not-exist-video".to_string(),
            ..V4l2Config::default()
        });
        assert!(source.connect().is_err());
        assert!(!source.is_healthy());
        assert!(source.next_frame().is_err());
        assert_eq!(source.stats().read_failures, 1);
    }
}
