//! Facility dashboard gateway.
//!
//! The reporting coordinator only sees the [`DashboardGateway`] capability.
//! `HttpDashboard` is the production implementation over the dashboard's REST
//! API; tests substitute in-memory gateways.

mod http;

pub use http::{DashboardConfig, HttpDashboard, RoomSummary};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::occupancy::OccupancyStatus;

/// Source tag stamped into every action item context.
pub const ACTION_SOURCE: &str = "vision_service";

/// Room status vocabulary accepted by the dashboard.
///
/// The detector only ever produces `Available` and `Occupied`; the other
/// values are set by staff through the dashboard itself.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    NeedsCleaning,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::NeedsCleaning => "needs_cleaning",
            RoomStatus::Maintenance => "maintenance",
        }
    }
}

impl From<OccupancyStatus> for RoomStatus {
    fn from(status: OccupancyStatus) -> Self {
        match status {
            OccupancyStatus::Available => RoomStatus::Available,
            OccupancyStatus::Occupied => RoomStatus::Occupied,
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Urgent,
    #[default]
    Normal,
    Low,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    #[default]
    RoomIssue,
    EquipmentIssue,
    AgentRequest,
    Manual,
}

/// An action item to be created on the dashboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionItem {
    pub title: String,
    pub description: String,
    pub urgency: Urgency,
    pub action_type: ActionType,
    pub room_id: Option<String>,
    pub reasoning: Option<String>,
}

/// Capability the reporting side needs from the dashboard.
///
/// Every call is synchronous and bounded by a timeout. Failures are returned,
/// never retried here.
pub trait DashboardGateway {
    /// Set the status of `room_id`.
    fn report_status(&self, room_id: &str, status: RoomStatus) -> Result<()>;

    /// Create an action item.
    fn create_action(&self, action: &ActionItem) -> Result<()>;

    /// True when the dashboard server process answers.
    fn probe(&self) -> bool;
}
