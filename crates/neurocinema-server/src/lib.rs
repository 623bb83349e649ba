//! Neurocinema Web Server - Axum coordinator
//!
//! Bridges the EEG collection engine to the browser video player: the
//! frontend reports clip starts and polls for the decision, the collection
//! worker runs in the background, and the ending video follows the choice.

pub mod api;

use axum::Router;
use neurocinema_core::{CollectorConfig, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    /// The one active measurement session
    pub session: Arc<Session>,
    /// Server configuration
    pub config: ServerConfig,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address
    pub bind_addr: String,
    /// Directory the clip and ending videos are served from
    pub video_dir: PathBuf,
    /// Directory holding the player page and other static assets
    pub assets_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_addr: "0.0.0.0".to_string(),
            video_dir: PathBuf::from("videos"),
            assets_dir: PathBuf::from("assets"),
        }
    }
}

impl ServerConfig {
    /// Read overrides from the environment: PORT, BIND_ADDR, VIDEO_DIR,
    /// ASSETS_DIR
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            video_dir: std::env::var("VIDEO_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.video_dir),
            assets_dir: std::env::var("ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_dir),
        }
    }
}

/// Collector overrides from the environment: UDP_PORT, FIELD_INDEX,
/// LEAD_TIME
pub fn collector_config_from_env() -> CollectorConfig {
    let defaults = CollectorConfig::default();
    CollectorConfig {
        udp_port: std::env::var("UDP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.udp_port),
        field_index: std::env::var("FIELD_INDEX")
            .ok()
            .and_then(|i| i.parse().ok())
            .unwrap_or(defaults.field_index),
        lead_time_secs: std::env::var("LEAD_TIME")
            .ok()
            .and_then(|l| l.parse().ok())
            .unwrap_or(defaults.lead_time_secs),
    }
}

impl AppState {
    pub fn new(session: Arc<Session>, config: ServerConfig) -> Self {
        Self { session, config }
    }
}

/// Build the Axum router with all routes
pub fn build_router(state: AppState) -> Router {
    let index = ServeFile::new(state.config.assets_dir.join("index.html"));
    let videos = ServeDir::new(state.config.video_dir.clone());

    Router::new()
        // Playback side: clip reports and decision polling
        .route(
            "/api/clip-started",
            axum::routing::post(api::clip_started),
        )
        .route("/api/clip-info", axum::routing::get(api::clip_info))
        .route("/api/decision", axum::routing::get(api::get_decision))
        // Collector side: decision submission (out-of-process path)
        .route("/api/decide", axum::routing::post(api::decide))
        // Operator: band/channel selection, live trace, reset, status
        .route("/api/eeg-config", axum::routing::post(api::eeg_config))
        .route("/api/eeg-live", axum::routing::get(api::eeg_live))
        .route("/api/reset", axum::routing::post(api::reset))
        .route("/api/status", axum::routing::get(api::get_status))
        .route(
            "/api/check-videos",
            axum::routing::get(api::check_videos),
        )
        // Player page and videos
        .route_service("/", index)
        .nest_service("/videos", videos)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.bind_addr, state.config.port);
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Neurocinema server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
