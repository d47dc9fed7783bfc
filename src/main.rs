mod alarm;
mod api;
mod clock;
mod config;
mod console;
mod controller;
mod error;
mod gateway;
mod playback;
mod selection;
mod status;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::{ApiServer, ApiServerConfig};
use crate::clock::SystemClock;
use crate::config::{AppConfig, ConfigOverrides, load_app_config};
use crate::console::Console;
use crate::controller::{AlarmController, ControllerSettings};
use crate::gateway::{PlaybackGateway, SpotifyConfig, SpotifyWebApi};

const DEFAULT_LOG_FILTER: &str = "spotify_alarm=info";

#[derive(Parser, Debug)]
#[command(
    name = "spotify-alarm",
    version,
    about = "Alarm clock that wakes you with a track from your Spotify playlists"
)]
struct Cli {
    /// JSON settings file; command-line values win over it.
    #[arg(long, env = "SPOTIFY_ALARM_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long, env = "SPOTIFY_API_BASE")]
    api_base: Option<String>,

    /// Scheduler poll interval in milliseconds.
    #[arg(long)]
    tick_ms: Option<u64>,

    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Playlists fetched for selection (1-50).
    #[arg(long)]
    playlist_limit: Option<u32>,

    #[arg(long, default_value = "127.0.0.1")]
    api_bind: String,

    /// Serve the local status API on this port. Off when omitted.
    #[arg(long)]
    api_port: Option<u16>,

    /// Log filter, e.g. `debug` or `spotify_alarm=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let base = match &cli.config {
        Some(path) => load_app_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::default(),
    };
    let config = base.apply(ConfigOverrides {
        access_token: cli.access_token,
        api_base: cli.api_base,
        request_timeout_secs: cli.request_timeout_secs,
        playlist_limit: cli.playlist_limit,
        tick_ms: cli.tick_ms,
    })?;
    let access_token = config.require_access_token()?.to_string();

    let gateway: Arc<dyn PlaybackGateway> = Arc::new(SpotifyWebApi::new(SpotifyConfig {
        api_base: config.api_base.clone(),
        access_token,
        request_timeout: config.request_timeout,
    })?);
    let controller = Arc::new(AlarmController::new(
        gateway,
        Arc::new(SystemClock),
        ControllerSettings {
            tick: config.tick,
            playlist_limit: config.playlist_limit,
        },
    ));
    info!(api_base = %config.api_base, "spotify alarm ready");

    let api_server = match cli.api_port {
        Some(port) => Some(
            ApiServer::start(
                ApiServerConfig {
                    bind_addr: cli.api_bind.clone(),
                    port,
                },
                Arc::clone(&controller),
            )
            .with_context(|| {
                format!("failed to start local API at {}:{}", cli.api_bind, port)
            })?,
        ),
        None => None,
    };

    if let Some(server) = &api_server {
        eprintln!(
            "Status API on http://{}:{}/v1/status",
            cli.api_bind,
            server.port()
        );
    }

    let console_result = Console::new(io::stdin().lock(), io::stdout()).run(&controller);

    controller.shutdown();
    drop(api_server);
    console_result
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid --log-level '{level}'"))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
    Ok(())
}
