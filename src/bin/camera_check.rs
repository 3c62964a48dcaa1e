//! camera_check - verify the camera and motion estimator before deploying
//!
//! Opens the configured camera, reads a few frames and prints the motion
//! metric for each. Exits non-zero if the camera cannot be opened or read.

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use room_vision::{
    BackgroundSubtractor, CameraSettings, CameraSource, FrameSource, MotionEstimator,
    VisionConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Check that the room camera works")]
struct Args {
    /// Device path (e.g. /dev/video1 or stub://busy). Defaults to the service config.
    #[arg(long)]
    device: Option<String>,

    /// Number of frames to read.
    #[arg(long, default_value_t = 5)]
    frames: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.frames == 0 {
        return Err(anyhow!("--frames must be >= 1"));
    }

    let config = VisionConfig::load()?;
    let camera = CameraSettings {
        device: args.device.unwrap_or(config.camera.device.clone()),
        ..config.camera.clone()
    };

    println!("opening camera {} ({})...", camera.name, camera.device);
    let mut source = CameraSource::new(&camera)?;
    source
        .connect()
        .with_context(|| format!("failed to open camera {}", camera.device))?;
    println!("camera opened");

    let mut estimator = BackgroundSubtractor::default();
    for i in 1..=args.frames {
        let frame = source
            .next_frame()
            .with_context(|| format!("failed to read frame {}", i))?;
        let metric = estimator.estimate(&frame)?;
        println!(
            "frame {}: {}x{} motion={:.0}",
            i, frame.width, frame.height, metric
        );
    }
    source.disconnect();

    println!("camera and motion estimator OK");
    Ok(())
}
