//! Bandpower frame decoding and band/channel field selection
//!
//! A Unicorn bandpower datagram is ASCII text: 70 comma-separated floats.
//! Only one field is semantically used per session; which one is derived
//! from the operator's band x channel selection.

use thiserror::Error;

/// Brainwave band names, indexed 0-6
pub const BAND_NAMES: [&str; 7] = [
    "delta",
    "theta",
    "alpha",
    "beta_low",
    "beta_mid",
    "beta_high",
    "gamma",
];

/// First payload index of each band's per-channel block (8 channels per band)
const BAND_BASES: [usize; 7] = [0, 8, 16, 24, 32, 40, 48];

/// All-channel average index for each band
const BAND_AVG_INDICES: [usize; 7] = [57, 58, 59, 60, 61, 62, 63];

/// Number of channels on the headset
const CHANNEL_COUNT: u8 = 8;

/// Invalid band/channel selection, rejected at the interface boundary
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("band must be 0-6, got {0}")]
    BandOutOfRange(i64),
    #[error("channel must be 1-8 or \"avg\", got {0:?}")]
    ChannelOutOfRange(String),
}

/// Decode one datagram and extract the field at `index`.
///
/// Returns `None` when the frame has too few fields or the field does not
/// parse as a float. Malformed frames are skipped, never surfaced as errors.
pub fn decode_frame(payload: &[u8], index: usize) -> Option<f64> {
    let text = String::from_utf8_lossy(payload);
    let field = text.trim().split(',').nth(index)?;
    field.trim().parse::<f64>().ok()
}

/// Map a band x channel selection to a payload field index and a human label.
///
/// `channel` is `"1"`-`"8"` for a single sensor or `"avg"` for the
/// all-channel average of the band.
pub fn payload_index(band: i64, channel: &str) -> Result<(usize, String), SelectionError> {
    let band_idx: usize = match band {
        0..=6 => band as usize,
        _ => return Err(SelectionError::BandOutOfRange(band)),
    };

    if channel == "avg" {
        let label = format!("{} (all-channels avg)", BAND_NAMES[band_idx]);
        return Ok((BAND_AVG_INDICES[band_idx], label));
    }

    let ch: u8 = channel
        .parse()
        .map_err(|_| SelectionError::ChannelOutOfRange(channel.to_string()))?;
    if ch < 1 || ch > CHANNEL_COUNT {
        return Err(SelectionError::ChannelOutOfRange(channel.to_string()));
    }

    let label = format!("{} ch{}", BAND_NAMES[band_idx], ch);
    Ok((BAND_BASES[band_idx] + (ch as usize - 1), label))
}
