//! Reporting coordinator.
//!
//! Decides, once per tick, which dashboard calls the latest detection warrants:
//!
//! - a status update when the detector flipped AND the new status differs from
//!   the last status the dashboard actually accepted (debounce);
//! - a single "needs cleaning" action once the room has stayed available for
//!   the cleaning timeout, re-armed only when the room is occupied again.
//!
//! Flags only move on confirmed delivery. A failed call leaves its flag alone,
//! so the next qualifying tick issues the same request again.

use std::time::Duration;

use crate::dashboard::{ActionItem, ActionType, DashboardGateway, RoomStatus, Urgency};
use crate::occupancy::{Detection, OccupancyStatus};

pub const DEFAULT_CLEANING_TIMEOUT_MINUTES: u64 = 5;

/// Room identity and cleaning policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportSettings {
    pub room_id: String,
    pub room_name: String,
    pub cleaning_timeout: Duration,
}

impl ReportSettings {
    fn cleaning_minutes(&self) -> u64 {
        self.cleaning_timeout.as_secs() / 60
    }
}

/// What the dashboard has accepted so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportState {
    /// Last status the dashboard accepted.
    pub last_reported_status: Option<OccupancyStatus>,
    /// Set once the cleaning action for the current empty period was delivered.
    pub cleaning_action_created: bool,
}

/// A dashboard call the coordinator wants made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportRequest {
    StatusUpdate {
        room_id: String,
        status: OccupancyStatus,
    },
    CreateAction(ActionItem),
}

/// Result of handing one request to the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub request: ReportRequest,
    pub delivered: bool,
}

/// Turns detections into dashboard requests and tracks what was delivered.
pub struct ReportingCoordinator {
    settings: ReportSettings,
    state: ReportState,
}

impl ReportingCoordinator {
    pub fn new(settings: ReportSettings) -> Self {
        Self {
            settings,
            state: ReportState::default(),
        }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    pub fn state(&self) -> &ReportState {
        &self.state
    }

    /// Decide this tick's requests.
    ///
    /// `cleaning_due` is the detector's verdict that the room has stayed
    /// available for the cleaning timeout. At most one status update and one
    /// action request are returned.
    pub fn handle(&mut self, detection: &Detection, cleaning_due: bool) -> Vec<ReportRequest> {
        let mut requests = Vec::with_capacity(2);

        if detection.changed {
            if self.state.last_reported_status != Some(detection.status) {
                requests.push(ReportRequest::StatusUpdate {
                    room_id: self.settings.room_id.clone(),
                    status: detection.status,
                });
            }
            if detection.status == OccupancyStatus::Occupied {
                self.state.cleaning_action_created = false;
            }
        }

        if detection.status == OccupancyStatus::Available
            && !self.state.cleaning_action_created
            && cleaning_due
        {
            log::info!(
                "room empty for {} minutes",
                self.settings.cleaning_minutes()
            );
            requests.push(ReportRequest::CreateAction(self.cleaning_action()));
        }

        requests
    }

    /// Record the gateway outcome for a request issued by [`handle`](Self::handle).
    pub fn acknowledge(&mut self, request: &ReportRequest, delivered: bool) {
        if !delivered {
            return;
        }
        match request {
            ReportRequest::StatusUpdate { status, .. } => {
                log::info!(
                    "dashboard updated: {} is {}",
                    self.settings.room_name,
                    status
                );
                self.state.last_reported_status = Some(*status);
            }
            ReportRequest::CreateAction(_) => {
                log::info!("action item created: room needs cleaning");
                self.state.cleaning_action_created = true;
            }
        }
    }

    /// Send `requests` through `gateway`, acknowledging each outcome.
    /// Failures are logged and not retried.
    pub fn deliver<G: DashboardGateway + ?Sized>(
        &mut self,
        requests: Vec<ReportRequest>,
        gateway: &G,
    ) -> Vec<Delivery> {
        requests
            .into_iter()
            .map(|request| {
                let result = match &request {
                    ReportRequest::StatusUpdate { room_id, status } => {
                        gateway.report_status(room_id, RoomStatus::from(*status))
                    }
                    ReportRequest::CreateAction(action) => gateway.create_action(action),
                };
                let delivered = match result {
                    Ok(()) => true,
                    Err(err) => {
                        log::error!("dashboard request failed: {:#}", err);
                        false
                    }
                };
                self.acknowledge(&request, delivered);
                Delivery { request, delivered }
            })
            .collect()
    }

    fn cleaning_action(&self) -> ActionItem {
        let minutes = self.settings.cleaning_minutes();
        ActionItem {
            title: format!("{} needs cleaning", self.settings.room_name),
            description: format!(
                "Room has been empty for {} minutes and requires cleaning before next patient.",
                minutes
            ),
            urgency: Urgency::Normal,
            action_type: ActionType::RoomIssue,
            room_id: Some(self.settings.room_id.clone()),
            reasoning: Some(format!(
                "Automatic detection: Room empty for {} minutes after last occupancy",
                minutes
            )),
        }
    }
}
