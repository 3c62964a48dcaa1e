//! Synthetic room camera for demos and tests.
//!
//! The device path picks the scene:
//! - `stub://empty` - static background, never any motion
//! - `stub://busy` - someone always moving in frame
//! - `stub://unavailable` - `connect` fails, like an unplugged camera
//! - any other `stub://...` - alternates visits (`visit_frames` frames with a
//!   person moving) and empty stretches (`empty_frames` frames)

use anyhow::{anyhow, Result};
use rand::Rng;

use super::{FrameSource, SourceStats};
use crate::frame::{Frame, PixelFormat};

const PERSON_WIDTH: u32 = 120;
const PERSON_HEIGHT: u32 = 260;
const PERSON_LUMA: u8 = 210;
const PERSON_STEP_PX: u32 = 15;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub device: String,
    pub width: u32,
    pub height: u32,
    /// Frames per visit when the scene cycles.
    pub visit_frames: u64,
    /// Frames between visits when the scene cycles.
    pub empty_frames: u64,
    /// Peak per-pixel sensor noise (luma levels).
    pub noise: u8,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "Synthetic Camera".to_string(),
            device: "stub://room".to_string(),
            width: 640,
            height: 480,
            visit_frames: 240,
            empty_frames: 1_200,
            noise: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scene {
    Empty,
    Busy,
    Cycle,
    Unavailable,
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    scene: Scene,
    connected: bool,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let scene = match config.device.trim_start_matches("stub://") {
            "empty" => Scene::Empty,
            "busy" => Scene::Busy,
            "unavailable" => Scene::Unavailable,
            _ => Scene::Cycle,
        };
        Self {
            config,
            scene,
            connected: false,
            frame_count: 0,
        }
    }

    fn person_present(&self) -> bool {
        match self.scene {
            Scene::Empty | Scene::Unavailable => false,
            Scene::Busy => true,
            Scene::Cycle => {
                let period = self.config.visit_frames + self.config.empty_frames;
                period > 0 && self.frame_count % period < self.config.visit_frames
            }
        }
    }

    fn render(&self) -> Vec<u8> {
        let (w, h) = (self.config.width, self.config.height);
        let mut rng = rand::thread_rng();
        let noise = self.config.noise as i16;
        let mut pixels: Vec<u8> = (0..h)
            .flat_map(|y| (0..w).map(move |x| background_luma(x, y, w, h)))
            .map(|base| {
                let jitter = if noise > 0 {
                    rng.gen_range(-noise..=noise)
                } else {
                    0
                };
                (base as i16 + jitter).clamp(0, 255) as u8
            })
            .collect();

        if self.person_present() && w > PERSON_WIDTH && h > PERSON_HEIGHT {
            let span = w - PERSON_WIDTH;
            let left = ((self.frame_count * PERSON_STEP_PX as u64) % span as u64) as u32;
            let top = (h - PERSON_HEIGHT) / 2;
            for y in top..top + PERSON_HEIGHT {
                let row = (y * w) as usize;
                for x in left..left + PERSON_WIDTH {
                    pixels[row + x as usize] = PERSON_LUMA;
                }
            }
        }
        pixels
    }
}

fn background_luma(x: u32, y: u32, w: u32, h: u32) -> u8 {
    (40 + (x * 60) / w.max(1) + (y * 30) / h.max(1)) as u8
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn connect(&mut self) -> Result<()> {
        if self.scene == Scene::Unavailable {
            return Err(anyhow!("failed to open camera {}", self.config.device));
        }
        self.connected = true;
        log::info!(
            "connected to {} ({}, synthetic {}x{})",
            self.config.name,
            self.config.device,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("synthetic camera not connected; call connect() first"));
        }
        let pixels = self.render();
        self.frame_count += 1;
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            PixelFormat::Gray8,
        )
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            read_failures: 0,
            source: self.config.device.clone(),
        }
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            log::info!("disconnected from {}", self.config.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{BackgroundSubtractor, MotionEstimator};

    fn source(device: &str) -> SyntheticSource {
        SyntheticSource::new(SyntheticConfig {
            device: device.to_string(),
            width: 320,
            height: 300,
            visit_frames: 5,
            empty_frames: 5,
            ..SyntheticConfig::default()
        })
    }

    #[test]
    fn produces_frames_after_connect() -> Result<()> {
        let mut src = source("stub://room");
        assert!(src.next_frame().is_err());
        src.connect()?;
        let frame = src.next_frame()?;
        assert_eq!((frame.width, frame.height), (320, 300));
        assert_eq!(src.stats().frames_captured, 1);
        src.disconnect();
        assert!(!src.is_healthy());
        Ok(())
    }

    #[test]
    fn unavailable_device_fails_to_connect() {
        let mut src = source("stub://unavailable");
        assert!(src.connect().is_err());
        assert!(!src.is_healthy());
    }

    #[test]
    fn empty_scene_stays_below_motion_threshold() -> Result<()> {
        let mut src = source("stub://empty");
        src.connect()?;
        let mut bg = BackgroundSubtractor::default();
        for _ in 0..10 {
            let metric = bg.estimate(&src.next_frame()?)?;
            assert!(metric <= 500.0, "metric {}", metric);
        }
        Ok(())
    }

    #[test]
    fn busy_scene_produces_motion() -> Result<()> {
        let mut src = source("stub://busy");
        src.connect()?;
        let mut bg = BackgroundSubtractor::default();
        bg.estimate(&src.next_frame()?)?;
        let metric = bg.estimate(&src.next_frame()?)?;
        assert!(metric > 500.0, "metric {}", metric);
        Ok(())
    }
}
