//! Room Vision
//!
//! Turns a camera feed into a debounced room-occupancy signal for a facility
//! dashboard.
//!
//! # Architecture
//!
//! Each tick of the polling loop runs one pass through:
//!
//! 1. **Frame source** (`ingest`): captures a frame, or reports the camera unavailable.
//! 2. **Motion estimator** (`motion`): reduces the frame to a non-negative motion metric.
//! 3. **Occupancy state machine** (`occupancy`): consecutive-frame hysteresis,
//!    confidence gating and an occupied cooldown produce `(status, confidence, changed)`.
//! 4. **Reporting coordinator** (`report`): debounced status updates and a one-shot
//!    "needs cleaning" action per empty period.
//! 5. **Dashboard gateway** (`dashboard`): the HTTP calls themselves.
//!
//! All state is in memory and lives for the process lifetime.

pub mod config;
pub mod dashboard;
pub mod frame;
pub mod ingest;
pub mod motion;
pub mod occupancy;
pub mod report;
pub mod service;

pub use config::{CameraSettings, RoomSettings, VisionConfig};
pub use dashboard::{
    ActionItem, ActionType, DashboardConfig, DashboardGateway, HttpDashboard, RoomStatus,
    RoomSummary, Urgency,
};
pub use frame::{Frame, PixelFormat};
pub use ingest::{CameraSource, FrameSource, SourceStats, SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::{V4l2Config, V4l2Source};
pub use motion::{BackgroundConfig, BackgroundSubtractor, MotionEstimator};
pub use occupancy::{
    detect, Detection, DetectorSettings, DetectorState, OccupancyDetector, OccupancyStatus,
};
pub use report::{Delivery, ReportRequest, ReportSettings, ReportState, ReportingCoordinator};
pub use service::{remaining_budget, LoopStats, TickOutcome, VisionService};
