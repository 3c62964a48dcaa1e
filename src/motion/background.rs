//! Background-subtraction motion estimator.
//!
//! Pure Rust stand-in for a mixture-of-Gaussians subtractor: blurred luma,
//! one adaptive Gaussian per pixel, foreground pixel count as the metric.

use anyhow::Result;

use super::MotionEstimator;
use crate::frame::Frame;

/// Tuning for [`BackgroundSubtractor`].
#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundConfig {
    /// Number of frames the background model effectively remembers.
    pub history: u32,
    /// Squared Mahalanobis distance above which a pixel is foreground.
    pub var_threshold: f32,
    /// Blur radius applied to the luma plane before modelling (radius 10 = 21x21).
    pub blur_radius: usize,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            blur_radius: 10,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
        }
    }
}

/// Single-Gaussian per-pixel background model.
///
/// Each pixel keeps a running mean and variance of its blurred luma. A pixel
/// whose squared distance from the mean exceeds `var_threshold` variances is
/// counted as foreground; the metric is the foreground pixel count. The model
/// learns quickly on the first frames (rate `1/n`) and settles at `1/history`.
pub struct BackgroundSubtractor {
    config: BackgroundConfig,
    mean: Vec<f32>,
    variance: Vec<f32>,
    dims: (u32, u32),
    frames_seen: u32,
}

impl BackgroundSubtractor {
    pub fn new(config: BackgroundConfig) -> Self {
        Self {
            config,
            mean: Vec::new(),
            variance: Vec::new(),
            dims: (0, 0),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    fn seed(&mut self, luma: &[f32], dims: (u32, u32)) {
        self.mean = luma.to_vec();
        self.variance = vec![self.config.var_init; luma.len()];
        self.dims = dims;
        self.frames_seen = 1;
    }

    fn learning_rate(&self) -> f32 {
        let n = self.frames_seen.clamp(1, self.config.history.max(1));
        1.0 / n as f32
    }
}

impl Default for BackgroundSubtractor {
    fn default() -> Self {
        Self::new(BackgroundConfig::default())
    }
}

impl MotionEstimator for BackgroundSubtractor {
    fn name(&self) -> &'static str {
        "background-subtractor"
    }

    fn estimate(&mut self, frame: &Frame) -> Result<f64> {
        let dims = (frame.width, frame.height);
        let luma = box_blur(
            &frame.to_gray(),
            frame.width as usize,
            frame.height as usize,
            self.config.blur_radius,
        );

        if self.frames_seen == 0 || self.dims != dims {
            if self.frames_seen > 0 {
                log::warn!(
                    "frame size changed {}x{} -> {}x{}; reseeding background",
                    self.dims.0,
                    self.dims.1,
                    dims.0,
                    dims.1
                );
            }
            self.seed(&luma, dims);
            return Ok(0.0);
        }

        self.frames_seen = self.frames_seen.saturating_add(1);
        let alpha = self.learning_rate();
        let (var_min, var_max) = (self.config.var_min, self.config.var_max);
        let mut foreground = 0u64;

        for ((&value, mean), var) in luma
            .iter()
            .zip(self.mean.iter_mut())
            .zip(self.variance.iter_mut())
        {
            let diff = value - *mean;
            let dist2 = diff * diff;
            if dist2 > self.config.var_threshold * *var {
                foreground += 1;
            }
            *mean += alpha * diff;
            *var = (*var + alpha * (dist2 - *var)).clamp(var_min, var_max);
        }

        Ok(foreground as f64)
    }

    fn reset(&mut self) {
        self.mean.clear();
        self.variance.clear();
        self.dims = (0, 0);
        self.frames_seen = 0;
    }
}

/// Separable box blur with clamped edges.
fn box_blur(gray: &[u8], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let src: Vec<f32> = gray.iter().map(|&v| v as f32).collect();
    if radius == 0 || width == 0 || height == 0 {
        return src;
    }
    let horizontal = blur_pass(&src, width, height, radius, 1, width);
    blur_pass(&horizontal, height, width, radius, width, 1)
}

/// One blur pass along lines of `len` samples spaced `step` apart; `count`
/// lines whose starts are `stride` apart.
fn blur_pass(
    src: &[f32],
    len: usize,
    count: usize,
    radius: usize,
    step: usize,
    stride: usize,
) -> Vec<f32> {
    let mut out = vec![0.0; src.len()];
    let window = (2 * radius + 1) as f32;
    let last = len - 1;
    for line in 0..count {
        let base = line * stride;
        let at = |i: usize| src[base + i.min(last) * step];
        let mut sum: f32 = (0..=radius).map(at).sum::<f32>() + radius as f32 * at(0);
        for i in 0..len {
            out[base + i * step] = sum / window;
            sum += at(i + radius + 1);
            sum -= at(i.saturating_sub(radius));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    const W: u32 = 64;
    const H: u32 = 48;

    fn flat(level: u8) -> Frame {
        Frame::new(vec![level; (W * H) as usize], W, H, PixelFormat::Gray8).unwrap()
    }

    fn with_block(level: u8, block: u8) -> Frame {
        let mut data = vec![level; (W * H) as usize];
        for y in 10..30 {
            for x in 20..40 {
                data[(y * W + x) as usize] = block;
            }
        }
        Frame::new(data, W, H, PixelFormat::Gray8).unwrap()
    }

    fn subtractor() -> BackgroundSubtractor {
        BackgroundSubtractor::new(BackgroundConfig {
            blur_radius: 2,
            ..BackgroundConfig::default()
        })
    }

    #[test]
    fn first_frame_seeds_background() -> Result<()> {
        let mut bg = subtractor();
        assert_eq!(bg.estimate(&with_block(40, 200))?, 0.0);
        assert_eq!(bg.frames_seen(), 1);
        Ok(())
    }

    #[test]
    fn static_scene_has_no_motion() -> Result<()> {
        let mut bg = subtractor();
        for _ in 0..10 {
            assert_eq!(bg.estimate(&flat(90))?, 0.0);
        }
        Ok(())
    }

    #[test]
    fn new_object_is_foreground() -> Result<()> {
        let mut bg = subtractor();
        for _ in 0..20 {
            bg.estimate(&flat(40))?;
        }
        let metric = bg.estimate(&with_block(40, 220))?;
        assert!(metric >= 400.0, "metric {} too small", metric);
        Ok(())
    }

    #[test]
    fn resize_reseeds_model() -> Result<()> {
        let mut bg = subtractor();
        bg.estimate(&flat(40))?;
        bg.estimate(&flat(40))?;
        let small = Frame::new(vec![200; 16], 4, 4, PixelFormat::Gray8)?;
        assert_eq!(bg.estimate(&small)?, 0.0);
        assert_eq!(bg.frames_seen(), 1);
        Ok(())
    }

    #[test]
    fn reset_forgets_learned_scene() -> Result<()> {
        let mut bg = subtractor();
        for _ in 0..20 {
            bg.estimate(&flat(40))?;
        }
        bg.reset();
        assert_eq!(bg.frames_seen(), 0);
        // The changed scene becomes the new background instead of foreground.
        assert_eq!(bg.estimate(&with_block(40, 220))?, 0.0);
        Ok(())
    }

    #[test]
    fn blur_preserves_flat_image() {
        let out = box_blur(&[7u8; 25], 5, 5, 2);
        assert!(out.iter().all(|&v| (v - 7.0).abs() < 1e-4));
    }
}
