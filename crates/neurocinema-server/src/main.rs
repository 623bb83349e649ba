//! Neurocinema coordinator binary
//!
//! Hosts the player page, accepts clip reports from the browser, runs the
//! EEG collection worker, and serves the decision back to the player.

use neurocinema_server::{collector_config_from_env, AppState, ServerConfig};
use neurocinema_core::Session;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("neurocinema_core=info".parse().unwrap())
                .add_directive("neurocinema_server=info".parse().unwrap()),
        )
        .init();

    let server_config = ServerConfig::from_env();
    let collector_config = collector_config_from_env();

    tracing::info!(
        http_port = server_config.port,
        udp_port = collector_config.udp_port,
        field_index = collector_config.field_index,
        lead_time_secs = collector_config.lead_time_secs,
        video_dir = %server_config.video_dir.display(),
        "Neurocinema starting"
    );

    for name in [
        "calm_clip.mp4",
        "excited_clip.mp4",
        "calm_ending.mp4",
        "excited_ending.mp4",
    ] {
        let present = server_config.video_dir.join(name).is_file();
        tracing::info!(video = name, present, "Video check");
    }

    let session = Arc::new(Session::new(collector_config));
    let state = AppState::new(session, server_config);

    if let Err(e) = neurocinema_server::start_server(state).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
