//! Neurocinema Core - EEG band-power collection and decision engine
//!
//! This library provides the signal side of the neurocinema demo: it reads
//! banded EEG power frames from a UDP stream (Unicorn Suite bandpower
//! payloads), averages a selected band/channel over two timed video-clip
//! windows, and turns the comparison into a "calm" vs "excited" decision.

pub mod decision;
pub mod eeg;
pub mod live;
pub mod session;

pub use decision::{decide, Choice, InvalidChoice};
pub use eeg::collector::{ChannelFrameSource, FrameSource, UdpFrameSource, WindowSummary};
pub use eeg::decoder::SelectionError;
pub use live::LiveTrace;
pub use session::{
    ClipEvent, Decision, LiveSnapshot, Session, SessionError, SessionStatus, SourceFactory,
};

use serde::{Deserialize, Serialize};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of comma-separated values in one Unicorn bandpower datagram
pub const PAYLOAD_FIELD_COUNT: usize = 70;

/// Default payload index: alpha band, channel 5 (value 21, 1-indexed)
pub const DEFAULT_FIELD_INDEX: usize = 20;

/// Default UDP port the Unicorn Suite sends bandpower on
pub const DEFAULT_UDP_PORT: u16 = 1000;

/// Default seconds to send the decision before clip 2 ends
pub const DEFAULT_LEAD_TIME_SECS: f64 = 0.5;

/// Collector configuration: which port to listen on, which payload field
/// to average, and how early the decision must be ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// UDP port the bandpower stream arrives on
    pub udp_port: u16,
    /// Payload field index to average (derived from band x channel)
    pub field_index: usize,
    /// Seconds subtracted from the second window so the decision lands
    /// before playback of clip 2 ends
    pub lead_time_secs: f64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            field_index: DEFAULT_FIELD_INDEX,
            lead_time_secs: DEFAULT_LEAD_TIME_SECS,
        }
    }
}
