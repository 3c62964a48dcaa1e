//! HTTP client for the facility dashboard REST API.
//!
//! Endpoints:
//! - `PUT  /api/facility/rooms/{id}/status` -> 200
//! - `POST /api/actions` -> 201
//! - `GET  /api/auth/me` -> 200, or 401 when the server is up but rejects the key
//! - `GET  /api/facility/rooms` -> 200 (room listing helper)

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ActionItem, ActionType, DashboardGateway, RoomStatus, Urgency, ACTION_SOURCE};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Connection settings for [`HttpDashboard`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Base URL, e.g. "http://localhost:3000". A trailing slash is ignored.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Timeout for status updates and action creation.
    pub request_timeout: Duration,
    /// Timeout for the liveness probe.
    pub probe_timeout: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Room entry returned by the room listing endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Serialize)]
struct StatusPayload {
    status: RoomStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionPayload<'a> {
    #[serde(rename = "type")]
    action_type: ActionType,
    urgency: Urgency,
    title: &'a str,
    description: &'a str,
    context: ActionContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    room_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<&'a str>,
}

#[derive(Serialize)]
struct ActionContext {
    source: &'static str,
    timestamp: String,
}

impl<'a> ActionPayload<'a> {
    fn new(action: &'a ActionItem, timestamp: String) -> Self {
        Self {
            action_type: action.action_type,
            urgency: action.urgency,
            title: &action.title,
            description: &action.description,
            context: ActionContext {
                source: ACTION_SOURCE,
                timestamp,
            },
            room_id: action.room_id.as_deref().filter(|id| !id.is_empty()),
            reasoning: action.reasoning.as_deref().filter(|r| !r.is_empty()),
        }
    }
}

/// Blocking dashboard client. One keep-alive agent for the process lifetime.
pub struct HttpDashboard {
    config: DashboardConfig,
    base_url: String,
    authorization: String,
    agent: ureq::Agent,
}

impl HttpDashboard {
    pub fn new(config: DashboardConfig) -> Result<Self> {
        let parsed = url::Url::parse(&config.base_url)
            .with_context(|| format!("invalid dashboard url {}", config.base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported dashboard scheme '{}'; expected http or https",
                parsed.scheme()
            ));
        }
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let authorization = format!("Bearer {}", config.api_key);
        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout)
            .build();
        log::info!("dashboard client initialized: {}", base_url);
        Ok(Self {
            config,
            base_url,
            authorization,
            agent,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List rooms known to the dashboard. Authenticates with `x-api-key`.
    pub fn list_rooms(&self) -> Result<Vec<RoomSummary>> {
        let url = format!("{}/api/facility/rooms", self.base_url);
        let response = match self
            .agent
            .get(&url)
            .set("x-api-key", &self.config.api_key)
            .call()
        {
            Ok(response) => response,
            Err(err) => return Err(describe_failure("list rooms", err)),
        };
        response
            .into_json::<Vec<RoomSummary>>()
            .context("decode room listing")
    }
}

impl DashboardGateway for HttpDashboard {
    fn report_status(&self, room_id: &str, status: RoomStatus) -> Result<()> {
        let url = format!("{}/api/facility/rooms/{}/status", self.base_url, room_id);
        log::info!("updating room {} status to: {}", room_id, status);
        let result = self
            .agent
            .put(&url)
            .set("Authorization", &self.authorization)
            .timeout(self.config.request_timeout)
            .send_json(StatusPayload { status });
        expect_status(result, 200, "update room status")
    }

    fn create_action(&self, action: &ActionItem) -> Result<()> {
        let url = format!("{}/api/actions", self.base_url);
        log::info!("creating action item: {}", action.title);
        let payload = ActionPayload::new(action, chrono::Utc::now().to_rfc3339());
        let result = self
            .agent
            .post(&url)
            .set("Authorization", &self.authorization)
            .timeout(self.config.request_timeout)
            .send_json(payload);
        expect_status(result, 201, "create action item")
    }

    fn probe(&self) -> bool {
        let url = format!("{}/api/auth/me", self.base_url);
        match self
            .agent
            .get(&url)
            .set("Authorization", &self.authorization)
            .timeout(self.config.probe_timeout)
            .call()
        {
            Ok(response) => response.status() == 200,
            Err(ureq::Error::Status(401, _)) => true,
            Err(err) => {
                log::debug!("dashboard probe failed: {}", err);
                false
            }
        }
    }
}

fn expect_status(
    result: std::result::Result<ureq::Response, ureq::Error>,
    expected: u16,
    what: &str,
) -> Result<()> {
    match result {
        Ok(response) if response.status() == expected => Ok(()),
        Ok(response) => {
            let code = response.status();
            let body = response.into_string().unwrap_or_default();
            Err(anyhow!("{} failed: {} - {}", what, code, body))
        }
        Err(err) => Err(describe_failure(what, err)),
    }
}

fn describe_failure(what: &str, err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            anyhow!("{} failed: {} - {}", what, code, body)
        }
        ureq::Error::Transport(transport) => anyhow!("{} failed: {}", what, transport),
    }
}
