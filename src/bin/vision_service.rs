//! vision_service - room occupancy daemon
//!
//! This daemon:
//! 1. Opens the configured camera (exits if it cannot)
//! 2. Checks the dashboard (continues degraded if unreachable)
//! 3. Ticks at FRAME_RATE: capture, motion metric, occupancy, reporting
//! 4. Stops cleanly on Ctrl-C, releasing the camera

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use room_vision::{BackgroundSubtractor, CameraSource, HttpDashboard, VisionConfig, VisionService};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Watch a room camera and report occupancy to the facility dashboard",
    after_help = "Real cameras need a build with `--features ingest-v4l2`; stub:// devices always work."
)]
struct Args {
    /// Optional JSON or TOML config file. Environment variables override it.
    #[arg(long, env = "VISION_CONFIG")]
    config: Option<PathBuf>,

    /// Log a detection summary every few seconds (same as DEBUG_LOGGING=true).
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = VisionConfig::load_from(args.config.as_deref())?;
    config.debug_logging |= args.debug;

    let source = CameraSource::new(&config.camera)?;
    let estimator = BackgroundSubtractor::default();
    let dashboard = HttpDashboard::new(config.dashboard.clone())?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;
    log::info!("press Ctrl-C to stop");

    let mut service = VisionService::new(config, source, estimator, dashboard);
    service.run(&stop)
}
