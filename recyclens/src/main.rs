use std::sync::Arc;

use anyhow::Context;
use recyclens_lib::audio::display_level;
use recyclens_lib::media::{SharedVideoSource, StillImageSource, VideoSource};
use recyclens_lib::network::ConnectionConfig;
use recyclens_lib::utils::init_logging;
use recyclens_lib::{ConnectionState, SessionConfig, StreamingSession};
use tokio::sync::Notify;

const CONFIG_VAR: &str = "RECYCLENS_CONFIG";
const IMAGE_VAR: &str = "RECYCLENS_IMAGE";
const DEFAULT_CONFIG_PATH: &str = "recyclens.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config_path = std::env::var(CONFIG_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = SessionConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    let connection = ConnectionConfig::from_env().context("Missing Gemini API key")?;

    let video: Arc<dyn VideoSource> = match std::env::var(IMAGE_VAR) {
        Ok(path) => Arc::new(
            StillImageSource::open(&path).with_context(|| format!("Failed to open image {}", path))?,
        ),
        Err(_) => {
            tracing::warn!("{} not set, streaming audio only", IMAGE_VAR);
            Arc::new(SharedVideoSource::new())
        }
    };

    let ended = Arc::new(Notify::new());
    let ended_by_remote = Arc::clone(&ended);

    let session = StreamingSession::with_default_backends(
        config,
        connection,
        Arc::new(move |state| {
            tracing::info!(state = %state, "State changed");
            if matches!(state, ConnectionState::Disconnected | ConnectionState::Error) {
                ended_by_remote.notify_one();
            }
        }),
        Arc::new(|level, is_output| {
            tracing::trace!(level = display_level(level), is_output, "Volume");
        }),
    )?;

    session.connect(video).await.context("Failed to connect")?;
    tracing::info!("Connected, press Ctrl-C to stop");

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl-C")?,
        _ = ended.notified() => tracing::info!("Session ended by the remote endpoint"),
    }

    session.disconnect();
    tracing::info!("Bye");
    Ok(())
}
