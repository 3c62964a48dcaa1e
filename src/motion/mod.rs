//! Motion signal estimation.
//!
//! An estimator turns a frame into a non-negative motion metric. The occupancy
//! state machine only compares that metric against a threshold, so any
//! foreground-ratio style algorithm can be swapped in here.

mod background;

pub use background::{BackgroundConfig, BackgroundSubtractor};

use anyhow::Result;

use crate::frame::Frame;

/// Reduces frames to a motion metric, keeping whatever scene model it needs.
pub trait MotionEstimator {
    /// Estimator identifier.
    fn name(&self) -> &'static str;

    /// Motion metric for `frame`. Always `>= 0`.
    fn estimate(&mut self, frame: &Frame) -> Result<f64>;

    /// Forget the learned scene. Called when frames resume after a capture outage.
    fn reset(&mut self) {}
}
