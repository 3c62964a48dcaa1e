//! Occupancy state machine.
//!
//! Turns a per-frame motion metric into a debounced `Available`/`Occupied`
//! status. Three mechanisms keep the status from flapping:
//!
//! - consecutive-frame counters: a status is only proposed after
//!   `motion_frames_required` frames with motion, or `no_motion_frames_required`
//!   frames without it;
//! - confidence gating: a proposed status is only accepted when its confidence
//!   meets `confidence_threshold`;
//! - occupied cooldown: once `Occupied`, the room stays occupied for at least
//!   `occupied_cooldown` regardless of how long motion has been absent.
//!
//! The state is an explicit value. [`detect`] takes the previous state and the
//! current instant and returns the next state, so the machine can be driven
//! deterministically in tests without reading a wall clock.

use std::fmt;
use std::time::{Duration, Instant};

pub const DEFAULT_MOTION_THRESHOLD: f64 = 500.0;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// ~1.5s at 2 FPS.
pub const DEFAULT_MOTION_FRAMES_REQUIRED: u32 = 3;
/// ~20s at 2 FPS.
pub const DEFAULT_NO_MOTION_FRAMES_REQUIRED: u32 = 40;
pub const DEFAULT_OCCUPIED_COOLDOWN_SECS: u64 = 30;

/// Confidence reported while the counters sit between both thresholds, and
/// while the occupied cooldown holds.
const INDETERMINATE_CONFIDENCE: f64 = 0.5;
/// Motion frames at which occupied confidence saturates.
const OCCUPIED_SATURATION_FRAMES: f64 = 10.0;
/// Still frames at which available confidence saturates.
const AVAILABLE_SATURATION_FRAMES: f64 = 60.0;

/// Room occupancy as seen by the detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OccupancyStatus {
    #[default]
    Available,
    Occupied,
}

impl OccupancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccupancyStatus::Available => "available",
            OccupancyStatus::Occupied => "occupied",
        }
    }
}

impl fmt::Display for OccupancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning for the state machine. Immutable once the service starts.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSettings {
    /// Motion metric strictly above this counts as motion.
    pub motion_threshold: f64,
    /// Minimum confidence for a status change to be accepted.
    pub confidence_threshold: f64,
    pub motion_frames_required: u32,
    pub no_motion_frames_required: u32,
    /// Minimum dwell in `Occupied` before `Available` is allowed.
    pub occupied_cooldown: Duration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            motion_frames_required: DEFAULT_MOTION_FRAMES_REQUIRED,
            no_motion_frames_required: DEFAULT_NO_MOTION_FRAMES_REQUIRED,
            occupied_cooldown: Duration::from_secs(DEFAULT_OCCUPIED_COOLDOWN_SECS),
        }
    }
}

/// Mutable detector state, replaced wholesale on every [`detect`] call.
///
/// At most one of the two frame counters is non-zero at any time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectorState {
    pub current_status: OccupancyStatus,
    pub motion_frames_count: u32,
    pub no_motion_frames_count: u32,
    pub last_motion_time: Option<Instant>,
    pub last_status_change_time: Option<Instant>,
}

impl DetectorState {
    /// State for a room already known to be in `status` since `since`.
    pub fn with_status(status: OccupancyStatus, since: Instant) -> Self {
        Self {
            current_status: status,
            last_status_change_time: Some(since),
            ..Self::default()
        }
    }
}

/// Output of one detection step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub status: OccupancyStatus,
    /// Confidence in the candidate status, in `[0, 1]`.
    pub confidence: f64,
    /// True only on the tick where `status` flipped.
    pub changed: bool,
}

/// Advance the state machine by one frame.
pub fn detect(
    state: &DetectorState,
    settings: &DetectorSettings,
    motion_metric: f64,
    now: Instant,
) -> (DetectorState, Detection) {
    let mut next = state.clone();

    let has_motion = motion_metric > settings.motion_threshold;
    if has_motion {
        next.motion_frames_count = next.motion_frames_count.saturating_add(1);
        next.no_motion_frames_count = 0;
        next.last_motion_time = Some(now);
    } else {
        next.no_motion_frames_count = next.no_motion_frames_count.saturating_add(1);
        next.motion_frames_count = 0;
    }

    let (candidate, confidence) = if next.motion_frames_count >= settings.motion_frames_required
    {
        (
            OccupancyStatus::Occupied,
            (next.motion_frames_count as f64 / OCCUPIED_SATURATION_FRAMES).min(1.0),
        )
    } else if next.no_motion_frames_count >= settings.no_motion_frames_required {
        if in_occupied_cooldown(&next, settings, now) {
            (OccupancyStatus::Occupied, INDETERMINATE_CONFIDENCE)
        } else {
            (
                OccupancyStatus::Available,
                (next.no_motion_frames_count as f64 / AVAILABLE_SATURATION_FRAMES).min(1.0),
            )
        }
    } else {
        (next.current_status, INDETERMINATE_CONFIDENCE)
    };

    let changed = candidate != next.current_status && confidence >= settings.confidence_threshold;
    if changed {
        log::info!(
            "status changed: {} -> {} (confidence {:.2})",
            next.current_status,
            candidate,
            confidence
        );
        next.current_status = candidate;
        next.last_status_change_time = Some(now);
    }

    let detection = Detection {
        status: next.current_status,
        confidence,
        changed,
    };
    (next, detection)
}

fn in_occupied_cooldown(state: &DetectorState, settings: &DetectorSettings, now: Instant) -> bool {
    if state.current_status != OccupancyStatus::Occupied {
        return false;
    }
    match state.last_status_change_time {
        Some(changed_at) => now.saturating_duration_since(changed_at) < settings.occupied_cooldown,
        None => false,
    }
}

/// Stateful wrapper that owns a [`DetectorState`] for the polling loop.
#[derive(Clone, Debug)]
pub struct OccupancyDetector {
    settings: DetectorSettings,
    state: DetectorState,
}

impl OccupancyDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        log::info!(
            "occupancy detector initialized (motion threshold {}, confidence {:.2})",
            settings.motion_threshold,
            settings.confidence_threshold
        );
        Self {
            settings,
            state: DetectorState::default(),
        }
    }

    pub fn with_state(settings: DetectorSettings, state: DetectorState) -> Self {
        Self { settings, state }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn status(&self) -> OccupancyStatus {
        self.state.current_status
    }

    pub fn detect(&mut self, motion_metric: f64, now: Instant) -> Detection {
        let (next, detection) = detect(&self.state, &self.settings, motion_metric, now);
        self.state = next;
        detection
    }

    pub fn time_since_last_motion(&self, now: Instant) -> Option<Duration> {
        self.state
            .last_motion_time
            .map(|at| now.saturating_duration_since(at))
    }

    pub fn time_since_status_change(&self, now: Instant) -> Option<Duration> {
        self.state
            .last_status_change_time
            .map(|at| now.saturating_duration_since(at))
    }

    /// True once the room has been `Available` for at least `timeout` since
    /// the last recorded status change. A room that has never changed status
    /// never qualifies.
    pub fn should_trigger_cleaning(&self, timeout: Duration, now: Instant) -> bool {
        if self.state.current_status != OccupancyStatus::Available {
            return false;
        }
        self.time_since_status_change(now)
            .is_some_and(|elapsed| elapsed >= timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(confidence_threshold: f64) -> DetectorSettings {
        DetectorSettings {
            confidence_threshold,
            ..DetectorSettings::default()
        }
    }

    fn run(
        detector: &mut OccupancyDetector,
        metric: f64,
        ticks: u32,
        start: Instant,
        step: Duration,
    ) -> Vec<Detection> {
        (0..ticks)
            .map(|i| detector.detect(metric, start + step * i))
            .collect()
    }

    #[test]
    fn three_motion_frames_mark_room_occupied() {
        let t0 = Instant::now();
        let mut detector = OccupancyDetector::new(settings(0.3));
        let out = run(&mut detector, 800.0, 3, t0, Duration::from_millis(500));

        assert_eq!(out[0].status, OccupancyStatus::Available);
        assert!(!out[0].changed);
        assert!(!out[1].changed);
        assert_eq!(out[2].status, OccupancyStatus::Occupied);
        assert!(out[2].changed);
        assert_eq!(
            detector.state().last_status_change_time,
            Some(t0 + Duration::from_millis(1000))
        );
    }

    #[test]
    fn low_confidence_candidate_is_not_accepted() {
        let t0 = Instant::now();
        let mut detector = OccupancyDetector::new(settings(0.7));
        let out = run(&mut detector, 800.0, 7, t0, Duration::from_millis(500));

        for d in &out[..6] {
            assert_eq!(d.status, OccupancyStatus::Available);
            assert!(!d.changed);
        }
        assert!((out[5].confidence - 0.6).abs() < 1e-9);
        assert_eq!(out[6].status, OccupancyStatus::Occupied);
        assert!(out[6].changed);
    }

    #[test]
    fn counters_reset_each_other() {
        let t0 = Instant::now();
        let mut detector = OccupancyDetector::new(settings(0.3));
        detector.detect(800.0, t0);
        detector.detect(800.0, t0);
        assert_eq!(detector.state().motion_frames_count, 2);

        detector.detect(0.0, t0);
        assert_eq!(detector.state().motion_frames_count, 0);
        assert_eq!(detector.state().no_motion_frames_count, 1);

        detector.detect(800.0, t0);
        assert_eq!(detector.state().motion_frames_count, 1);
        assert_eq!(detector.state().no_motion_frames_count, 0);
    }

    #[test]
    fn metric_equal_to_threshold_is_not_motion() {
        let t0 = Instant::now();
        let mut detector = OccupancyDetector::new(settings(0.3));
        detector.detect(500.0, t0);
        assert_eq!(detector.state().motion_frames_count, 0);
        assert_eq!(detector.state().last_motion_time, None);
    }

    #[test]
    fn indeterminate_zone_keeps_status() {
        let t0 = Instant::now();
        let mut detector = OccupancyDetector::new(settings(0.3));
        let out = run(&mut detector, 0.0, 39, t0, Duration::from_millis(500));
        for d in out {
            assert_eq!(d.status, OccupancyStatus::Available);
            assert_eq!(d.confidence, 0.5);
            assert!(!d.changed);
        }
    }

    #[test]
    fn cooldown_holds_occupied_status() {
        let t0 = Instant::now();
        let state = DetectorState::with_status(OccupancyStatus::Occupied, t0);
        let mut detector = OccupancyDetector::with_state(settings(0.3), state);

        // 40 still frames ending at t=15s
        let step = Duration::from_secs(15) / 39;
        let out = run(&mut detector, 0.0, 40, t0, step);
        let last = out.last().unwrap();
        assert_eq!(last.status, OccupancyStatus::Occupied);
        assert!(!last.changed);
        assert_eq!(last.confidence, 0.5);
    }

    #[test]
    fn room_becomes_available_after_cooldown() {
        let t0 = Instant::now();
        let state = DetectorState::with_status(OccupancyStatus::Occupied, t0);
        let mut detector = OccupancyDetector::with_state(settings(0.3), state);

        // 40 still frames ending at t=35s
        let step = Duration::from_secs(35) / 39;
        let out = run(&mut detector, 0.0, 40, t0, step);
        let last = out.last().unwrap();
        assert_eq!(last.status, OccupancyStatus::Available);
        assert!(last.changed);
        assert!((last.confidence - 40.0 / 60.0).abs() < 1e-9);
        assert!(out[..39].iter().all(|d| !d.changed));
    }

    #[test]
    fn confidence_saturates_at_one() {
        let t0 = Instant::now();
        let mut detector = OccupancyDetector::new(settings(0.3));
        let out = run(&mut detector, 900.0, 25, t0, Duration::from_millis(500));
        assert_eq!(out.last().unwrap().confidence, 1.0);
        assert_eq!(out.iter().filter(|d| d.changed).count(), 1);
    }

    #[test]
    fn detect_is_pure_over_explicit_state() {
        let t0 = Instant::now();
        let cfg = settings(0.3);
        let start = DetectorState::default();
        let (a, da) = detect(&start, &cfg, 800.0, t0);
        let (b, db) = detect(&start, &cfg, 800.0, t0);
        assert_eq!(a, b);
        assert_eq!(da, db);
        assert_eq!(start, DetectorState::default());
    }

    #[test]
    fn cleaning_requires_recorded_change() {
        let t0 = Instant::now();
        let detector = OccupancyDetector::new(settings(0.3));
        assert!(!detector.should_trigger_cleaning(Duration::ZERO, t0 + Duration::from_secs(600)));

        let state = DetectorState::with_status(OccupancyStatus::Available, t0);
        let detector = OccupancyDetector::with_state(settings(0.3), state);
        let timeout = Duration::from_secs(300);
        assert!(!detector.should_trigger_cleaning(timeout, t0 + Duration::from_secs(299)));
        assert!(detector.should_trigger_cleaning(timeout, t0 + Duration::from_secs(300)));
    }

    #[test]
    fn time_since_last_motion_tracks_latest_motion_frame() {
        let t0 = Instant::now();
        let mut detector = OccupancyDetector::new(settings(0.3));
        assert_eq!(detector.time_since_last_motion(t0), None);
        detector.detect(800.0, t0);
        detector.detect(0.0, t0 + Duration::from_secs(2));
        assert_eq!(
            detector.time_since_last_motion(t0 + Duration::from_secs(5)),
            Some(Duration::from_secs(5))
        );
    }
}
