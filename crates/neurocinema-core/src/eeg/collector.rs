//! Windowed sample collection from a datagram stream
//!
//! A collection window accumulates a running sum and count of decoded
//! samples until its deadline elapses. Receives are bounded to 1s per
//! attempt so a deadline is never overshot by more than that margin.

use super::decoder::decode_frame;
use crate::live::LiveTrace;
use std::io;
use std::net::UdpSocket;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Upper bound on a single receive wait, so deadline checks stay responsive
const MAX_RECV_WAIT: Duration = Duration::from_secs(1);

/// Datagram receive buffer size (a bandpower frame is well under 1 KiB)
const RECV_BUF_SIZE: usize = 1024;

/// A source of raw measurement frames, one datagram at a time.
///
/// `recv_timeout` waits up to `timeout` for one frame and returns
/// `Ok(None)` when the wait elapses without data.
pub trait FrameSource {
    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>>;
}

/// Frame source backed by a bound UDP socket
pub struct UdpFrameSource {
    socket: UdpSocket,
    buf: [u8; RECV_BUF_SIZE],
}

impl UdpFrameSource {
    /// Bind to the given port on all interfaces
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        Ok(Self {
            socket,
            buf: [0u8; RECV_BUF_SIZE],
        })
    }
}

impl FrameSource for UdpFrameSource {
    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        // A zero read timeout means "block forever" to the OS; keep it >= 1ms
        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, _)) => Ok(Some(self.buf[..len].to_vec())),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Frame source backed by a crossbeam channel, for tests and driverless runs
pub struct ChannelFrameSource {
    rx: crossbeam_channel::Receiver<Vec<u8>>,
}

impl ChannelFrameSource {
    pub fn new(rx: crossbeam_channel::Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }
}

impl FrameSource for ChannelFrameSource {
    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            // A disconnected feeder behaves like silence: the window still
            // runs to its deadline and closes with whatever it has.
            Err(_) => Ok(None),
        }
    }
}

/// Result of one closed collection window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowSummary {
    /// Running sum of accepted samples
    pub sum: f64,
    /// Number of accepted samples
    pub count: u64,
}

impl WindowSummary {
    /// Mean of the window, or NaN when no samples arrived
    pub fn mean(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            f64::NAN
        }
    }
}

/// Collect samples from `source` until `budget` elapses.
///
/// Malformed or short frames are skipped silently. Each accepted sample is
/// appended to `trace` when one is supplied, for live visualization. A zero
/// budget returns immediately with an empty summary.
pub fn collect_window(
    source: &mut dyn FrameSource,
    field_index: usize,
    budget: Duration,
    label: &str,
    trace: Option<&Mutex<LiveTrace>>,
) -> anyhow::Result<WindowSummary> {
    let mut summary = WindowSummary::default();
    if budget.is_zero() {
        return Ok(summary);
    }

    let t0 = Instant::now();
    loop {
        let elapsed = t0.elapsed();
        if elapsed >= budget {
            break;
        }

        let wait = (budget - elapsed).min(MAX_RECV_WAIT);
        let Some(frame) = source.recv_timeout(wait)? else {
            continue;
        };

        let Some(value) = decode_frame(&frame, field_index) else {
            continue;
        };

        summary.sum += value;
        summary.count += 1;

        if let Some(trace) = trace {
            if let Ok(mut trace) = trace.lock() {
                trace.push(value);
            }
        }

        if summary.count % 10 == 1 {
            tracing::debug!(
                window = label,
                sample = summary.count,
                value,
                elapsed_secs = t0.elapsed().as_secs_f64(),
                "Accepted sample"
            );
        }
    }

    tracing::info!(
        window = label,
        samples = summary.count,
        sum = summary.sum,
        "Collection window closed"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_returns_immediately() {
        let (_tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(8);
        let mut source = ChannelFrameSource::new(rx);

        let t0 = Instant::now();
        let summary =
            collect_window(&mut source, 0, Duration::ZERO, "test", None).unwrap();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.sum, 0.0);
        assert!(t0.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_mean_of_empty_window_is_nan() {
        let summary = WindowSummary::default();
        assert!(summary.mean().is_nan());
    }

    #[test]
    fn test_mean_of_populated_window() {
        let summary = WindowSummary { sum: 15.0, count: 3 };
        assert_eq!(summary.mean(), 5.0);
    }

    #[test]
    fn test_malformed_frames_do_not_affect_count() {
        let (tx, rx) = crossbeam_channel::unbounded::<Vec<u8>>();
        tx.send(b"1.0,2.0".to_vec()).unwrap(); // too short for index 2
        tx.send(b"1.0,2.0,bogus".to_vec()).unwrap(); // unparseable
        tx.send(b"1.0,2.0,4.5".to_vec()).unwrap(); // valid
        drop(tx);

        let mut source = ChannelFrameSource::new(rx);
        let summary =
            collect_window(&mut source, 2, Duration::from_millis(150), "test", None).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.sum, 4.5);
    }

    #[test]
    fn test_window_terminates_with_silent_source() {
        let (_tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(1);
        let mut source = ChannelFrameSource::new(rx);

        let t0 = Instant::now();
        let summary =
            collect_window(&mut source, 0, Duration::from_millis(200), "test", None).unwrap();
        assert_eq!(summary.count, 0);
        // Deadline plus at most one bounded receive wait
        assert!(t0.elapsed() < Duration::from_millis(200) + MAX_RECV_WAIT);
    }

    #[test]
    fn test_samples_feed_live_trace() {
        let (tx, rx) = crossbeam_channel::unbounded::<Vec<u8>>();
        tx.send(b"3.5".to_vec()).unwrap();
        tx.send(b"4.5".to_vec()).unwrap();
        drop(tx);

        let trace = Mutex::new(LiveTrace::new());
        let mut source = ChannelFrameSource::new(rx);
        let summary = collect_window(
            &mut source,
            0,
            Duration::from_millis(100),
            "test",
            Some(&trace),
        )
        .unwrap();

        assert_eq!(summary.count, 2);
        let trace = trace.lock().unwrap();
        assert_eq!(trace.history(), vec![3.5, 4.5]);
        assert_eq!(trace.latest(), Some(4.5));
    }
}
