//! Headless command-line client for spatial voice sessions

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, error, info, trace, warn};
use network::{AudioEnvironment, RenderedFrames, RtcBackend, WebRtcBackend};
use session::{Session, SessionOptions, VolumeLimits};
use settings_manager::{ConfigManager, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use voice_core::DisconnectInfo;

/// spatial_voice - positional voice chat client
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Signaling server address, e.g. http://localhost:8080
    #[clap(short, long)]
    server: Option<String>,

    /// Session token handed out by the game server
    #[clap(long)]
    session: Option<String>,

    /// Config file to read instead of the default location
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

/// Settings from the config file with command-line overrides applied
fn resolve_settings(args: &Args, config: &ConfigManager) -> Result<Settings> {
    let mut settings = config.settings().clone();
    if let Some(server) = &args.server {
        settings.server_address = server.clone();
    }
    if let Some(session) = &args.session {
        settings.session_id = session.clone();
    }

    if settings.session_id.is_empty() {
        bail!("No session id given; pass --session or set session_id in the config file");
    }
    settings.validate()?;
    Ok(settings)
}

fn session_options(settings: &Settings) -> SessionOptions {
    SessionOptions {
        keep_alive: settings.keep_alive(),
        volume: VolumeLimits {
            default: settings.default_volume,
            max: settings.max_volume,
        },
    }
}

fn load_config(args: &Args) -> Result<ConfigManager> {
    let config = match &args.config {
        Some(path) => ConfigManager::with_file(path),
        None => ConfigManager::new(),
    };
    config.context("Failed to load configuration")
}

/// Log what the session publishes. The returned receiver yields once the
/// signaling connection goes away.
fn watch_session(session: &Session) -> mpsc::UnboundedReceiver<DisconnectInfo> {
    session.status_observable().subscribe(|status| {
        info!("Connection status: {}", status);
    });

    session.local_id_observable().subscribe(|id| {
        info!("Server assigned local player id {}", id);
    });

    session.roster().subscribe(|entries| {
        let names: Vec<&str> = entries.values().map(|entry| entry.name.as_str()).collect();
        info!("{} players in session: {}", entries.len(), names.join(", "));
    });

    session.participants_observable().subscribe(|participants| {
        debug!("{} participants tracked", participants.len());
    });

    session.on_error().add_listener(|report| {
        warn!("Session error ({:?}): {}", report.kind, report.message);
    });

    let (disconnected_tx, disconnected_rx) = mpsc::unbounded_channel();
    session.on_disconnect().add_listener(move |info| {
        let _ = disconnected_tx.send(info.clone());
    });
    disconnected_rx
}

/// Drain rendered audio. No output device is attached, so frames are only traced.
async fn drain_frames(mut frames: RenderedFrames) {
    let mut count: u64 = 0;
    while let Some(frame) = frames.recv().await {
        count += 1;
        trace!(
            "Frame {} from {}: {} bytes, gains {:.2}/{:.2}",
            count,
            frame.player_id,
            frame.payload.len(),
            frame.gains.left,
            frame.gains.right
        );
    }
    debug!("Audio output closed after {} frames", count);
}

async fn run(settings: Settings) -> Result<()> {
    let (environment, frames) = AudioEnvironment::receive_only();
    let backend = WebRtcBackend::new(&settings.ice_servers, &environment)
        .context("Failed to set up WebRTC")?;
    let backend: Arc<dyn RtcBackend> = Arc::new(backend);
    tokio::spawn(drain_frames(frames));

    let mut session = Session::new(
        &settings.server_address,
        &settings.session_id,
        Arc::new(environment),
        backend,
        session_options(&settings),
    )?;
    let mut disconnected = watch_session(&session);

    info!("Connecting to {}", session.endpoint());
    session.connect().await?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Interrupted, leaving session");
        }
        Some(info) = disconnected.recv() => {
            if info.errored {
                error!("Disconnected from server: {}", info.message);
            } else {
                info!("Server closed the connection: {}", info.message);
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.debug { "debug" } else { "info" }),
    )
    .init();

    let config = load_config(&args)?;
    debug!("Using config file {:?}", config.path());
    let settings = resolve_settings(&args, &config)?;

    run(settings).await
}
