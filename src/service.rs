//! Polling loop.
//!
//! One tick = capture -> motion metric -> occupancy detection -> reporting.
//! Ticks never overlap; dashboard calls block inside the tick and are bounded
//! by the gateway's own timeouts. The loop paces itself to `1 / frame_rate`
//! and starts the next tick immediately when a tick overruns its budget.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::VisionConfig;
use crate::dashboard::DashboardGateway;
use crate::ingest::FrameSource;
use crate::motion::MotionEstimator;
use crate::occupancy::{Detection, OccupancyDetector};
use crate::report::{Delivery, ReportingCoordinator};

const DEBUG_LOG_INTERVAL: Duration = Duration::from_secs(5);
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// What happened during one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// No frame (or no metric) this tick; detector state untouched.
    Skipped,
    Processed {
        motion_metric: f64,
        detection: Detection,
        deliveries: Vec<Delivery>,
    },
}

/// Loop counters, mostly for health logging.
///
/// `skipped` counts ticks with no usable frame or metric; `overruns` counts
/// ticks that took longer than the frame interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub skipped: u64,
    pub overruns: u64,
}

/// The polling loop. Owns the camera, the motion estimator and the dashboard
/// client for the process lifetime.
pub struct VisionService<S, M, G> {
    config: VisionConfig,
    source: S,
    estimator: M,
    dashboard: G,
    detector: OccupancyDetector,
    coordinator: ReportingCoordinator,
    stats: LoopStats,
    last_debug_log: Option<Instant>,
    last_health_log: Option<Instant>,
    capture_lost: bool,
    running: bool,
}

impl<S, M, G> VisionService<S, M, G>
where
    S: FrameSource,
    M: MotionEstimator,
    G: DashboardGateway,
{
    /// Build the service. Nothing is opened until [`start`](Self::start).
    pub fn new(config: VisionConfig, source: S, estimator: M, dashboard: G) -> Self {
        let detector = OccupancyDetector::new(config.detector.clone());
        let coordinator = ReportingCoordinator::new(config.report_settings());
        Self {
            config,
            source,
            estimator,
            dashboard,
            detector,
            coordinator,
            stats: LoopStats::default(),
            last_debug_log: None,
            last_health_log: None,
            capture_lost: false,
            running: false,
        }
    }

    pub fn detector(&self) -> &OccupancyDetector {
        &self.detector
    }

    pub fn coordinator(&self) -> &ReportingCoordinator {
        &self.coordinator
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Open the camera and check the dashboard.
    ///
    /// Only an unusable camera is an error. An unreachable dashboard is logged
    /// and the service runs degraded until it comes back.
    pub fn start(&mut self) -> Result<()> {
        log::info!("{}", "=".repeat(60));
        log::info!("vision service starting");
        log::info!("{}", "=".repeat(60));
        log::info!(
            "room: {} (id: {})",
            self.config.room.name,
            self.config.room.id
        );
        log::info!(
            "camera: {} ({})",
            self.config.camera.name,
            self.config.camera.device
        );
        log::info!("frame rate: {} FPS", self.config.frame_rate);
        log::info!(
            "cleaning timeout: {} minutes",
            self.config.cleaning_timeout.as_secs() / 60
        );
        log::info!("motion estimator: {}", self.estimator.name());

        self.source
            .connect()
            .with_context(|| format!("failed to connect to camera {}", self.config.camera.device))?;

        log::info!("checking dashboard connection...");
        if self.dashboard.probe() {
            log::info!("dashboard backend connected");
        } else {
            log::warn!("dashboard backend not reachable");
            log::warn!("  service will continue but updates may fail");
        }

        log::info!("monitoring {}...", self.config.room.name);
        self.running = true;
        Ok(())
    }

    /// Run one tick at `now`.
    pub fn process_frame(&mut self, now: Instant) -> TickOutcome {
        self.stats.ticks += 1;

        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("failed to capture frame: {:#}", err);
                self.capture_lost = true;
                self.stats.skipped += 1;
                return TickOutcome::Skipped;
            }
        };
        if self.capture_lost {
            log::info!("camera frames resumed; relearning background");
            self.estimator.reset();
            self.capture_lost = false;
        }

        let motion_metric = match self.estimator.estimate(&frame) {
            Ok(metric) if metric.is_finite() && metric >= 0.0 => metric,
            Ok(metric) => {
                log::warn!("motion estimator returned invalid metric {}", metric);
                self.stats.skipped += 1;
                return TickOutcome::Skipped;
            }
            Err(err) => {
                log::warn!("motion estimation failed: {:#}", err);
                self.stats.skipped += 1;
                return TickOutcome::Skipped;
            }
        };
        drop(frame);

        let detection = self.detector.detect(motion_metric, now);
        self.log_debug(&detection, now);

        let cleaning_due = self
            .detector
            .should_trigger_cleaning(self.coordinator.settings().cleaning_timeout, now);
        let requests = self.coordinator.handle(&detection, cleaning_due);
        let deliveries = self.coordinator.deliver(requests, &self.dashboard);

        TickOutcome::Processed {
            motion_metric,
            detection,
            deliveries,
        }
    }

    /// Start, then tick at the configured rate until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        self.start()?;
        let period = self.config.frame_interval();

        while !stop.load(Ordering::SeqCst) {
            let tick_start = Instant::now();
            self.process_frame(tick_start);
            self.log_health(tick_start);

            match remaining_budget(period, tick_start.elapsed()) {
                Some(wait) => std::thread::sleep(wait),
                None => self.stats.overruns += 1,
            }
        }

        log::info!("shutting down...");
        self.stop();
        Ok(())
    }

    /// Release the camera. Safe to call more than once.
    pub fn stop(&mut self) {
        self.running = false;
        self.source.disconnect();
        log::info!("vision service stopped");
    }

    fn log_debug(&mut self, detection: &Detection, now: Instant) {
        if !self.config.debug_logging {
            return;
        }
        let due = self
            .last_debug_log
            .map_or(true, |at| now.saturating_duration_since(at) >= DEBUG_LOG_INTERVAL);
        if !due {
            return;
        }
        let state = self.detector.state();
        log::info!(
            "[debug] status: {}, confidence: {:.2}, motion frames: {}, no-motion frames: {}",
            detection.status,
            detection.confidence,
            state.motion_frames_count,
            state.no_motion_frames_count
        );
        self.last_debug_log = Some(now);
    }

    fn log_health(&mut self, now: Instant) {
        let due = self
            .last_health_log
            .map_or(true, |at| now.saturating_duration_since(at) >= HEALTH_LOG_INTERVAL);
        if !due {
            return;
        }
        let source = self.source.stats();
        log::debug!(
            "camera health={} frames={} read_failures={} ticks={} skipped={} overruns={}",
            self.source.is_healthy(),
            source.frames_captured,
            source.read_failures,
            self.stats.ticks,
            self.stats.skipped,
            self.stats.overruns
        );
        self.last_health_log = Some(now);
    }
}

/// Time left in a tick of length `period` after `elapsed` of work, or `None`
/// when the tick overran and the next one should start right away.
pub fn remaining_budget(period: Duration, elapsed: Duration) -> Option<Duration> {
    period.checked_sub(elapsed).filter(|wait| !wait.is_zero())
}
