//! REST API endpoints for the neurocinema coordinator
//!
//! Wire format matches what the player page and any out-of-process
//! collector expect: JSON bodies, fractional unix-second timestamps,
//! 400 + `{"error": ...}` on invalid input.

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use neurocinema_core::eeg::decoder;
use neurocinema_core::session::{ClipEvent, LiveSnapshot};
use neurocinema_core::{Choice, SessionStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Video files the player page expects to find
const EXPECTED_VIDEOS: [&str; 4] = [
    "calm_clip.mp4",
    "excited_clip.mp4",
    "calm_ending.mp4",
    "excited_ending.mp4",
];

/// Client error body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn unix_secs(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}

/// Generic acknowledgement
#[derive(Serialize)]
pub struct OkResponse {
    pub status: &'static str,
}

impl OkResponse {
    fn ok() -> Self {
        Self { status: "ok" }
    }
}

/// Clip start report from the player page
#[derive(Deserialize)]
pub struct ClipStartRequest {
    pub clip: i64,
    pub duration: f64,
}

/// One clip event on the wire (start_time as fractional unix seconds)
#[derive(Serialize)]
pub struct ClipEventResponse {
    pub started: bool,
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
}

impl From<&ClipEvent> for ClipEventResponse {
    fn from(event: &ClipEvent) -> Self {
        Self {
            started: event.started,
            start_time: event.start_time.map(unix_secs),
            duration: event.duration_secs,
        }
    }
}

/// Clip status for both indices
#[derive(Serialize)]
pub struct ClipInfoResponse {
    pub clip1: ClipEventResponse,
    pub clip2: ClipEventResponse,
}

/// Decision submission from an out-of-process collector
#[derive(Deserialize)]
pub struct DecideRequest {
    pub choice: String,
}

/// Acknowledgement of a submitted decision
#[derive(Serialize)]
pub struct DecideResponse {
    pub status: &'static str,
    pub choice: Choice,
}

/// Current decision, nullable until one is published
#[derive(Serialize)]
pub struct DecisionResponse {
    pub decision: Option<Choice>,
    pub timestamp: Option<f64>,
}

/// Band/channel selection from the operator dropdowns
#[derive(Deserialize)]
pub struct EegConfigRequest {
    pub band: i64,
    pub channel: String,
}

/// Resolved payload field selection
#[derive(Serialize)]
pub struct EegConfigResponse {
    pub status: &'static str,
    pub index: usize,
    pub label: String,
}

/// Application status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub session: SessionStatus,
    pub udp_port: u16,
    pub field_index: usize,
    pub lead_time_secs: f64,
}

/// POST /api/clip-started
///
/// The player page reports when a clip starts and how long it runs.
/// Clip 1 launches the collection worker.
pub async fn clip_started(
    State(state): State<AppState>,
    Json(req): Json<ClipStartRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let clip = u8::try_from(req.clip).map_err(|_| bad_request("clip must be 1 or 2"))?;
    state
        .session
        .report_clip_start(clip, req.duration)
        .map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(OkResponse::ok()))
}

/// GET /api/clip-info
///
/// Timing-dependent collaborators poll this for clip starts and durations.
pub async fn clip_info(State(state): State<AppState>) -> Json<ClipInfoResponse> {
    let [clip1, clip2] = state.session.clip_info();
    Json(ClipInfoResponse {
        clip1: ClipEventResponse::from(&clip1),
        clip2: ClipEventResponse::from(&clip2),
    })
}

/// POST /api/decide
///
/// Alternate path when collection runs out-of-process; overwrites the
/// session's decision.
pub async fn decide(
    State(state): State<AppState>,
    Json(req): Json<DecideRequest>,
) -> Result<Json<DecideResponse>, ApiError> {
    let choice: Choice = req
        .choice
        .parse()
        .map_err(|e: neurocinema_core::InvalidChoice| bad_request(e.to_string()))?;
    state.session.submit_decision(choice);
    Ok(Json(DecideResponse {
        status: "ok",
        choice,
    }))
}

/// GET /api/decision
///
/// The player page polls this until a decision appears; safe at any rate.
pub async fn get_decision(State(state): State<AppState>) -> Json<DecisionResponse> {
    let decision = state.session.decision();
    Json(DecisionResponse {
        decision: decision.map(|d| d.choice),
        timestamp: decision.map(|d| unix_secs(d.decided_at)),
    })
}

/// POST /api/eeg-config
///
/// Selects which brainwave band and channel the collector averages.
pub async fn eeg_config(
    State(state): State<AppState>,
    Json(req): Json<EegConfigRequest>,
) -> Result<Json<EegConfigResponse>, ApiError> {
    let (index, label) = decoder::payload_index(req.band, &req.channel)
        .map_err(|e| bad_request(e.to_string()))?;
    state.session.set_field_index(index);
    tracing::info!(band = req.band, channel = %req.channel, index, %label, "EEG selection updated");
    Ok(Json(EegConfigResponse {
        status: "ok",
        index,
        label,
    }))
}

/// GET /api/eeg-live
///
/// Live trace for the browser visualization.
pub async fn eeg_live(State(state): State<AppState>) -> Json<LiveSnapshot> {
    Json(state.session.live_snapshot())
}

/// POST /api/reset
///
/// Clears all session state for a new run.
pub async fn reset(State(state): State<AppState>) -> Json<OkResponse> {
    state.session.reset();
    Json(OkResponse::ok())
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: neurocinema_core::VERSION.to_string(),
        session: state.session.status(),
        udp_port: state.session.config().udp_port,
        field_index: state.session.field_index(),
        lead_time_secs: state.session.config().lead_time_secs,
    })
}

/// GET /api/check-videos
///
/// Reports which of the expected video files are present on disk.
pub async fn check_videos(State(state): State<AppState>) -> Json<BTreeMap<String, bool>> {
    let found = EXPECTED_VIDEOS
        .iter()
        .map(|name| {
            let present = state.config.video_dir.join(name).is_file();
            (name.to_string(), present)
        })
        .collect();
    Json(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_start_request_deserializes() {
        let req: ClipStartRequest =
            serde_json::from_str(r#"{"clip": 1, "duration": 30.0}"#).unwrap();
        assert_eq!(req.clip, 1);
        assert_eq!(req.duration, 30.0);
    }

    #[test]
    fn test_clip_info_response_serializes_nulls() {
        let resp = ClipInfoResponse {
            clip1: ClipEventResponse::from(&ClipEvent::default()),
            clip2: ClipEventResponse::from(&ClipEvent::default()),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"started\":false"));
        assert!(json.contains("\"start_time\":null"));
        assert!(json.contains("\"duration\":null"));
    }

    #[test]
    fn test_started_clip_event_carries_unix_seconds() {
        let event = ClipEvent {
            started: true,
            start_time: Some(Utc::now()),
            duration_secs: Some(30.0),
        };
        let resp = ClipEventResponse::from(&event);
        assert!(resp.started);
        let now = unix_secs(Utc::now());
        assert!((resp.start_time.unwrap() - now).abs() < 1.0);
    }

    #[test]
    fn test_decision_response_serializes() {
        let resp = DecisionResponse {
            decision: Some(Choice::Excited),
            timestamp: Some(1700000000.5),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"decision\":\"excited\""));
        assert!(json.contains("\"timestamp\":1700000000.5"));
    }

    #[test]
    fn test_eeg_config_request_deserializes() {
        let req: EegConfigRequest =
            serde_json::from_str(r#"{"band": 2, "channel": "avg"}"#).unwrap();
        assert_eq!(req.band, 2);
        assert_eq!(req.channel, "avg");
    }

    #[test]
    fn test_status_response_serializes_session_state() {
        let resp = StatusResponse {
            version: "0.1.0".to_string(),
            session: SessionStatus::AwaitingClip2,
            udp_port: 1000,
            field_index: 20,
            lead_time_secs: 0.5,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"session\":\"awaiting-clip2\""));
        assert!(json.contains("\"udp_port\":1000"));
    }
}
