//! Rolling trace of recently accepted samples for live visualization
//!
//! The browser polls this while a window is collecting; only the last
//! [`LIVE_HISTORY_LEN`] values are kept.

use std::collections::VecDeque;

/// Number of samples retained for the live graph
pub const LIVE_HISTORY_LEN: usize = 80;

/// Bounded ring of the most recent accepted sample values
#[derive(Debug, Default)]
pub struct LiveTrace {
    history: VecDeque<f64>,
    latest: Option<f64>,
}

impl LiveTrace {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(LIVE_HISTORY_LEN),
            latest: None,
        }
    }

    /// Append a sample, evicting the oldest once the ring is full
    pub fn push(&mut self, value: f64) {
        if self.history.len() >= LIVE_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(value);
        self.latest = Some(value);
    }

    /// Most recently accepted sample, if any
    pub fn latest(&self) -> Option<f64> {
        self.latest
    }

    /// Retained history, oldest first
    pub fn history(&self) -> Vec<f64> {
        self.history.iter().copied().collect()
    }

    /// Drop all retained samples
    pub fn clear(&mut self) {
        self.history.clear();
        self.latest = None;
    }
}
