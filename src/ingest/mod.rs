//! Frame sources.
//!
//! - Synthetic room (`stub://...` devices), always available
//! - V4L2 cameras (feature: ingest-v4l2)
//!
//! A source is opened once at startup and owned by the polling loop for the
//! process lifetime. `connect` failing is fatal for the service; a failed
//! `next_frame` only skips the current tick.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

use anyhow::Result;

use crate::config::CameraSettings;
use crate::frame::Frame;

/// Capture statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub read_failures: u64,
    pub source: String,
}

/// A camera the polling loop reads one frame per tick from.
pub trait FrameSource {
    /// Human-readable camera name.
    fn name(&self) -> &str;

    /// Open the device and verify a frame can be read.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// False once reads have been failing for longer than the source tolerates.
    fn is_healthy(&self) -> bool;

    /// Capture counters since the source was created.
    fn stats(&self) -> SourceStats;

    /// Release the device. Safe to call more than once.
    fn disconnect(&mut self);
}

/// Camera selected by configuration.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Source),
}

impl CameraSource {
    pub fn new(camera: &CameraSettings) -> Result<Self> {
        if camera.device.starts_with("stub://") {
            let config = SyntheticConfig {
                name: camera.name.clone(),
                device: camera.device.clone(),
                width: camera.width,
                height: camera.height,
                ..SyntheticConfig::default()
            };
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticSource::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            let config = V4l2Config {
                name: camera.name.clone(),
                device: camera.device.clone(),
                target_fps: camera.capture_fps,
                width: camera.width,
                height: camera.height,
            };
            Ok(Self {
                backend: CameraBackend::Device(V4l2Source::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(anyhow::anyhow!(
                "camera {} needs V4L2 support: rebuild with `--features ingest-v4l2`, or use a stub:// device",
                camera.device
            ))
        }
    }
}

impl FrameSource for CameraSource {
    fn name(&self) -> &str {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.name(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.name(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }

    fn disconnect(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.disconnect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.disconnect(),
        }
    }
}
