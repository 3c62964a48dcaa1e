//! End-to-end occupancy scenarios through the public API.
//!
//! These drive the detector and the reporting coordinator together with an
//! injected clock, the same way the polling loop does, and check:
//! 1. Hysteresis: occupied only after 3 motion ticks, available only after
//!    40 still ticks AND the 30s cooldown
//! 2. Debounce: no repeated status update for the same status
//! 3. Cleaning: one action per empty period, re-armed by occupancy

use anyhow::{anyhow, Result};
use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use room_vision::{
    ActionItem, DashboardGateway, Detection, DetectorSettings, DetectorState, OccupancyDetector,
    OccupancyStatus, ReportSettings, ReportingCoordinator, RoomStatus,
};

const TICK: Duration = Duration::from_millis(500);

#[derive(Default)]
struct FakeDashboard {
    down: Cell<bool>,
    statuses: RefCell<Vec<RoomStatus>>,
    actions: RefCell<Vec<ActionItem>>,
}

impl DashboardGateway for FakeDashboard {
    fn report_status(&self, _room_id: &str, status: RoomStatus) -> Result<()> {
        if self.down.get() {
            return Err(anyhow!("connection refused"));
        }
        self.statuses.borrow_mut().push(status);
        Ok(())
    }

    fn create_action(&self, action: &ActionItem) -> Result<()> {
        if self.down.get() {
            return Err(anyhow!("connection refused"));
        }
        self.actions.borrow_mut().push(action.clone());
        Ok(())
    }

    fn probe(&self) -> bool {
        !self.down.get()
    }
}

/// Detector + coordinator + fake dashboard on an injected clock.
struct Room {
    detector: OccupancyDetector,
    coordinator: ReportingCoordinator,
    dashboard: FakeDashboard,
    now: Instant,
}

impl Room {
    fn new(settings: DetectorSettings, cleaning_minutes: u64) -> Self {
        Self::with_state(settings, DetectorState::default(), Instant::now(), cleaning_minutes)
    }

    fn with_state(
        settings: DetectorSettings,
        state: DetectorState,
        now: Instant,
        cleaning_minutes: u64,
    ) -> Self {
        Self {
            detector: OccupancyDetector::with_state(settings, state),
            coordinator: ReportingCoordinator::new(ReportSettings {
                room_id: "room-1".to_string(),
                room_name: "Exam Room 1".to_string(),
                cleaning_timeout: Duration::from_secs(cleaning_minutes * 60),
            }),
            dashboard: FakeDashboard::default(),
            now,
        }
    }

    fn tick_at(&mut self, metric: f64, now: Instant) -> Detection {
        self.now = now;
        let detection = self.detector.detect(metric, now);
        let cleaning_due = self
            .detector
            .should_trigger_cleaning(self.coordinator.settings().cleaning_timeout, now);
        let requests = self.coordinator.handle(&detection, cleaning_due);
        self.coordinator.deliver(requests, &self.dashboard);
        detection
    }

    fn tick(&mut self, metric: f64) -> Detection {
        let next = self.now + TICK;
        self.tick_at(metric, next)
    }

    fn ticks(&mut self, metric: f64, count: u32) -> Vec<Detection> {
        (0..count).map(|_| self.tick(metric)).collect()
    }
}

fn scenario_settings() -> DetectorSettings {
    DetectorSettings {
        motion_threshold: 500.0,
        confidence_threshold: 0.3,
        ..DetectorSettings::default()
    }
}

#[test]
fn scenario_a_three_motion_ticks_mark_room_occupied() {
    let mut room = Room::new(scenario_settings(), 5);
    let out = room.ticks(800.0, 3);

    assert!(!out[0].changed && !out[1].changed);
    assert_eq!(out[2].status, OccupancyStatus::Occupied);
    assert!(out[2].changed);
    assert_eq!(*room.dashboard.statuses.borrow(), vec![RoomStatus::Occupied]);
}

#[test]
fn scenario_b_cooldown_keeps_room_occupied() {
    let t0 = Instant::now();
    let state = DetectorState::with_status(OccupancyStatus::Occupied, t0);
    let mut room = Room::with_state(scenario_settings(), state, t0, 5);

    let step = Duration::from_secs(15) / 39;
    let mut last = None;
    for i in 0..40u32 {
        last = Some(room.tick_at(0.0, t0 + step * i));
    }
    let last = last.unwrap();
    assert_eq!(last.status, OccupancyStatus::Occupied);
    assert!(!last.changed);
    assert!(room.dashboard.statuses.borrow().is_empty());
}

#[test]
fn scenario_c_room_available_after_cooldown() {
    let t0 = Instant::now();
    let state = DetectorState::with_status(OccupancyStatus::Occupied, t0);
    let mut room = Room::with_state(scenario_settings(), state, t0, 5);

    let step = Duration::from_secs(35) / 39;
    let mut last = None;
    for i in 0..40u32 {
        last = Some(room.tick_at(0.0, t0 + step * i));
    }
    let last = last.unwrap();
    assert_eq!(last.status, OccupancyStatus::Available);
    assert!(last.changed);
    assert_eq!(*room.dashboard.statuses.borrow(), vec![RoomStatus::Available]);
}

#[test]
fn scenario_d_one_cleaning_action_per_empty_period() {
    let t0 = Instant::now();
    let state = DetectorState::with_status(OccupancyStatus::Available, t0);
    let mut room = Room::with_state(scenario_settings(), state, t0, 5);

    // Five minutes of an empty room at 2 ticks per second.
    room.ticks(0.0, 5 * 60 * 2);
    assert_eq!(room.dashboard.actions.borrow().len(), 1);
    assert!(room.coordinator.state().cleaning_action_created);

    // A sixth minute adds nothing.
    room.ticks(0.0, 60 * 2);
    assert_eq!(room.dashboard.actions.borrow().len(), 1);

    let action = &room.dashboard.actions.borrow()[0];
    assert_eq!(action.title, "Exam Room 1 needs cleaning");
    assert_eq!(
        action.description,
        "Room has been empty for 5 minutes and requires cleaning before next patient."
    );
}

#[test]
fn reoccupied_room_gets_a_new_cleaning_action() {
    let mut room = Room::new(scenario_settings(), 1);

    // occupied, then empty long enough to pass the cooldown and the timeout
    room.ticks(800.0, 3);
    room.ticks(0.0, 60 + 2 * 60 + 10);
    assert_eq!(room.detector.status(), OccupancyStatus::Available);
    assert_eq!(room.dashboard.actions.borrow().len(), 1);

    room.ticks(800.0, 3);
    assert_eq!(room.detector.status(), OccupancyStatus::Occupied);
    assert!(!room.coordinator.state().cleaning_action_created);

    room.ticks(0.0, 60 + 2 * 60 + 10);
    assert_eq!(room.dashboard.actions.borrow().len(), 2);
    assert_eq!(
        *room.dashboard.statuses.borrow(),
        vec![
            RoomStatus::Occupied,
            RoomStatus::Available,
            RoomStatus::Occupied,
            RoomStatus::Available,
        ]
    );
}

#[test]
fn steady_pattern_never_reports_again() {
    let mut room = Room::new(scenario_settings(), 5);
    room.ticks(800.0, 3);
    let reported = room.coordinator.state().last_reported_status;

    for d in room.ticks(800.0, 200) {
        assert!(!d.changed);
    }
    assert_eq!(room.coordinator.state().last_reported_status, reported);
    assert_eq!(room.dashboard.statuses.borrow().len(), 1);
}

#[test]
fn flicker_shorter_than_hysteresis_is_ignored() {
    let mut room = Room::new(scenario_settings(), 5);
    // Two-tick bursts separated by stillness never reach 3 consecutive frames.
    for _ in 0..50 {
        room.ticks(900.0, 2);
        room.ticks(0.0, 1);
    }
    assert_eq!(room.detector.status(), OccupancyStatus::Available);
    assert!(room.dashboard.statuses.borrow().is_empty());
}

#[test]
fn available_requires_forty_still_ticks_even_after_cooldown() {
    let mut room = Room::new(scenario_settings(), 5);
    room.ticks(800.0, 3);

    // Wait out the cooldown with motion, then go still.
    room.ticks(800.0, 70);
    let still = room.ticks(0.0, 40);
    assert!(still[..39].iter().all(|d| d.status == OccupancyStatus::Occupied));
    assert_eq!(still[39].status, OccupancyStatus::Available);
    assert!(still[39].changed);
}

#[test]
fn dashboard_outage_defers_cleaning_until_it_recovers() {
    let t0 = Instant::now();
    let state = DetectorState::with_status(OccupancyStatus::Available, t0);
    let mut room = Room::with_state(scenario_settings(), state, t0, 5);

    room.dashboard.down.set(true);
    room.ticks(0.0, 5 * 60 * 2 + 20);
    assert!(!room.coordinator.state().cleaning_action_created);
    assert!(room.dashboard.actions.borrow().is_empty());

    room.dashboard.down.set(false);
    room.tick(0.0);
    assert!(room.coordinator.state().cleaning_action_created);
    assert_eq!(room.dashboard.actions.borrow().len(), 1);
}

#[test]
fn failed_occupied_report_is_not_resent_on_steady_ticks() {
    let mut room = Room::new(scenario_settings(), 5);
    room.dashboard.down.set(true);
    room.ticks(800.0, 3);
    assert_eq!(room.coordinator.state().last_reported_status, None);

    room.dashboard.down.set(false);
    room.ticks(800.0, 20);
    assert!(room.dashboard.statuses.borrow().is_empty());
}
