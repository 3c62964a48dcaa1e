//! list_rooms - print the room ids the dashboard knows about
//!
//! Helps fill in ROOM_ID for a new camera.

use anyhow::Result;
use clap::Parser;

use room_vision::{DashboardConfig, HttpDashboard};

#[derive(Parser, Debug)]
#[command(author, version, about = "List rooms registered on the facility dashboard")]
struct Args {
    /// Dashboard base URL.
    #[arg(long, env = "DASHBOARD_URL", default_value = "http://localhost:3000")]
    url: String,

    /// Dashboard API key.
    #[arg(long, env = "DASHBOARD_API_KEY", default_value = "")]
    api_key: String,

    /// Print every room instead of only the first.
    #[arg(long)]
    all: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let dashboard = HttpDashboard::new(DashboardConfig {
        base_url: args.url,
        api_key: args.api_key,
        ..DashboardConfig::default()
    })?;

    let rooms = dashboard.list_rooms()?;
    if rooms.is_empty() {
        println!("dashboard returned no rooms");
        return Ok(());
    }

    let shown = if args.all { rooms.len() } else { 1 };
    for room in rooms.iter().take(shown) {
        println!("{}", "=".repeat(60));
        println!("name:   {}", room.name.as_deref().unwrap_or("unknown"));
        println!("type:   {}", room.room_type.as_deref().unwrap_or("unknown"));
        println!("status: {}", room.status.as_deref().unwrap_or("unknown"));
        println!("ROOM_ID={}", room.id);
    }
    println!("{}", "=".repeat(60));
    Ok(())
}
