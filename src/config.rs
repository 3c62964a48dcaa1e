//! Service configuration.
//!
//! Loaded once at startup: an optional config file (JSON, or TOML when the
//! path ends in `.toml`) named by `VISION_CONFIG`, then environment overrides,
//! then validation.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use crate::dashboard::DashboardConfig;
use crate::occupancy::{
    DetectorSettings, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MOTION_FRAMES_REQUIRED,
    DEFAULT_MOTION_THRESHOLD, DEFAULT_NO_MOTION_FRAMES_REQUIRED, DEFAULT_OCCUPIED_COOLDOWN_SECS,
};
use crate::report::{ReportSettings, DEFAULT_CLEANING_TIMEOUT_MINUTES};

const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_CAMERA_NAME: &str = "Webcam";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAPTURE_FPS: u32 = 30;
const DEFAULT_ROOM_ID: &str = "room-1";
const DEFAULT_ROOM_NAME: &str = "Exam Room 1";
const DEFAULT_FRAME_RATE: u32 = 2;
const MAX_FRAME_RATE: u32 = 60;
const DEFAULT_DASHBOARD_URL: &str = "http://localhost:3000";
const DEFAULT_DASHBOARD_TIMEOUT_SECS: u64 = 5;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Deserialize, Default)]
struct VisionConfigFile {
    camera: Option<CameraConfigFile>,
    room: Option<RoomConfigFile>,
    frame_rate: Option<u32>,
    detector: Option<DetectorConfigFile>,
    dashboard: Option<DashboardConfigFile>,
    debug_logging: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    index: Option<u32>,
    name: Option<String>,
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    capture_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RoomConfigFile {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    motion_threshold: Option<f64>,
    confidence_threshold: Option<f64>,
    motion_frames_required: Option<u32>,
    no_motion_frames_required: Option<u32>,
    occupied_cooldown_secs: Option<u64>,
    cleaning_timeout_minutes: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DashboardConfigFile {
    url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionConfig {
    pub camera: CameraSettings,
    pub room: RoomSettings,
    /// Polling ticks per second.
    pub frame_rate: u32,
    pub detector: DetectorSettings,
    pub cleaning_timeout: Duration,
    pub dashboard: DashboardConfig,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    pub index: u32,
    pub name: String,
    /// Device path. `stub://...` selects the synthetic camera.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub capture_fps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub id: String,
    pub name: String,
}

impl VisionConfig {
    /// Load from `VISION_CONFIG` (if set) and the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var("VISION_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load from an explicit config file (if any) and the environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => VisionConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }

    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            room_id: self.room.id.clone(),
            room_name: self.room.name.clone(),
            cleaning_timeout: self.cleaning_timeout,
        }
    }

    fn from_file(file: VisionConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let index = camera_file.index.unwrap_or(DEFAULT_CAMERA_INDEX);
        let camera = CameraSettings {
            index,
            name: camera_file
                .name
                .unwrap_or_else(|| DEFAULT_CAMERA_NAME.to_string()),
            device: camera_file
                .device
                .unwrap_or_else(|| device_for_index(index)),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            capture_fps: camera_file.capture_fps.unwrap_or(DEFAULT_CAPTURE_FPS),
        };

        let room_file = file.room.unwrap_or_default();
        let room = RoomSettings {
            id: room_file.id.unwrap_or_else(|| DEFAULT_ROOM_ID.to_string()),
            name: room_file
                .name
                .unwrap_or_else(|| DEFAULT_ROOM_NAME.to_string()),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            motion_threshold: detector_file
                .motion_threshold
                .unwrap_or(DEFAULT_MOTION_THRESHOLD),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            motion_frames_required: detector_file
                .motion_frames_required
                .unwrap_or(DEFAULT_MOTION_FRAMES_REQUIRED),
            no_motion_frames_required: detector_file
                .no_motion_frames_required
                .unwrap_or(DEFAULT_NO_MOTION_FRAMES_REQUIRED),
            occupied_cooldown: Duration::from_secs(
                detector_file
                    .occupied_cooldown_secs
                    .unwrap_or(DEFAULT_OCCUPIED_COOLDOWN_SECS),
            ),
        };
        let cleaning_timeout = minutes(
            detector_file
                .cleaning_timeout_minutes
                .unwrap_or(DEFAULT_CLEANING_TIMEOUT_MINUTES),
        );

        let dashboard_file = file.dashboard.unwrap_or_default();
        let dashboard = DashboardConfig {
            base_url: dashboard_file
                .url
                .unwrap_or_else(|| DEFAULT_DASHBOARD_URL.to_string()),
            api_key: dashboard_file.api_key.unwrap_or_default(),
            request_timeout: Duration::from_secs(
                dashboard_file
                    .timeout_secs
                    .unwrap_or(DEFAULT_DASHBOARD_TIMEOUT_SECS),
            ),
            probe_timeout: Duration::from_secs(
                dashboard_file
                    .probe_timeout_secs
                    .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
            ),
        };

        Self {
            camera,
            room,
            frame_rate: file.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
            detector,
            cleaning_timeout,
            dashboard,
            debug_logging: file.debug_logging.unwrap_or(false),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(index) = env_parse::<u32>("CAMERA_INDEX", "an integer")? {
            self.camera.index = index;
            self.camera.device = device_for_index(index);
        }
        if let Some(device) = env_string("CAMERA_DEVICE") {
            self.camera.device = device;
        }
        if let Some(name) = env_string("CAMERA_NAME") {
            self.camera.name = name;
        }
        if let Some(id) = env_string("ROOM_ID") {
            self.room.id = id;
        }
        if let Some(name) = env_string("ROOM_NAME") {
            self.room.name = name;
        }
        if let Some(rate) = env_parse::<u32>("FRAME_RATE", "an integer number of frames per second")? {
            self.frame_rate = rate;
        }
        if let Some(threshold) = env_parse::<f64>("MOTION_THRESHOLD", "a number")? {
            self.detector.motion_threshold = threshold;
        }
        if let Some(confidence) = env_parse::<f64>("OCCUPANCY_CONFIDENCE", "a number")? {
            self.detector.confidence_threshold = confidence;
        }
        if let Some(timeout) = env_parse::<u64>("CLEANING_TIMEOUT_MINUTES", "an integer number of minutes")? {
            self.cleaning_timeout = minutes(timeout);
        }
        if let Some(url) = env_string("DASHBOARD_URL") {
            self.dashboard.base_url = url;
        }
        if let Some(key) = env_string("DASHBOARD_API_KEY") {
            self.dashboard.api_key = key;
        }
        if let Some(flag) = env_string("DEBUG_LOGGING") {
            self.debug_logging = parse_flag(&flag);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        validate_room_id(&self.room.id)?;
        if self.frame_rate == 0 || self.frame_rate > MAX_FRAME_RATE {
            return Err(anyhow!(
                "frame rate must be between 1 and {} FPS (got {})",
                MAX_FRAME_RATE,
                self.frame_rate
            ));
        }
        let motion = self.detector.motion_threshold;
        if !motion.is_finite() || motion < 0.0 {
            return Err(anyhow!("motion threshold must be a non-negative number"));
        }
        let confidence = self.detector.confidence_threshold;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(anyhow!(
                "occupancy confidence must be within [0, 1] (got {})",
                confidence
            ));
        }
        if self.detector.motion_frames_required == 0 || self.detector.no_motion_frames_required == 0
        {
            return Err(anyhow!("required frame counts must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }

        let url = url::Url::parse(&self.dashboard.base_url)
            .with_context(|| format!("invalid DASHBOARD_URL {}", self.dashboard.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("DASHBOARD_URL must use http or https"));
        }
        self.dashboard.base_url = self.dashboard.base_url.trim_end_matches('/').to_string();
        if self.dashboard.api_key.trim().is_empty() {
            log::warn!("DASHBOARD_API_KEY is not set; dashboard requests will be rejected");
        }
        Ok(())
    }
}

/// Room ids are dashboard identifiers (UUIDs or short slugs).
pub fn validate_room_id(room_id: &str) -> Result<()> {
    static ROOM_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ROOM_ID_RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("room id pattern")
    });
    if !re.is_match(room_id) {
        return Err(anyhow!(
            "invalid room id '{}': expected 1-64 letters, digits, '-' or '_'",
            room_id
        ));
    }
    Ok(())
}

fn device_for_index(index: u32) -> String {
    format!("/dev/video{}", index)
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

fn read_config_file(path: &Path) -> Result<VisionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: VisionConfigFile = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {} (got '{}')", key, expected, raw)),
        None => Ok(None),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
