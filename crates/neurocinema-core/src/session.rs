//! Session coordinator: two timed collection windows and one decision
//!
//! A [`Session`] owns all per-session state: the two clip events reported by
//! the playback side, the decision, the live trace, and the background
//! collection worker. Clip 1 starting launches the worker; the worker runs
//! window 1, waits for clip 2, runs window 2, then publishes the decision.
//!
//! Reset is safe while a window is in flight: the worker captures the
//! session generation at spawn and discards its result if the generation
//! has moved on by the time it finishes.

use crate::decision::{decide, Choice};
use crate::eeg::collector::{collect_window, FrameSource, UdpFrameSource};
use crate::eeg::timing::collection_budget;
use crate::live::LiveTrace;
use crate::CollectorConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

/// How often the worker re-checks for the clip 2 event
const CLIP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Builds a frame source for one collection run
pub type SourceFactory = dyn Fn() -> io::Result<Box<dyn FrameSource + Send>> + Send + Sync;

/// Coordinator state over one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Idle,
    CollectingClip1,
    AwaitingClip2,
    CollectingClip2,
    Done,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::CollectingClip1 => "collecting-clip1",
            SessionStatus::AwaitingClip2 => "awaiting-clip2",
            SessionStatus::CollectingClip2 => "collecting-clip2",
            SessionStatus::Done => "done",
            SessionStatus::Error => "error",
        }
    }
}

/// One clip-start report from the playback side.
///
/// Written once per clip index per session; never mutated once `started`.
#[derive(Debug, Clone, Default)]
pub struct ClipEvent {
    pub started: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
}

/// The published outcome of a session
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub choice: Choice,
    pub decided_at: DateTime<Utc>,
}

/// Snapshot of the live trace for the visualization endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    pub value: Option<f64>,
    pub history: Vec<f64>,
    pub status: SessionStatus,
}

/// Invalid input from an external caller
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("clip index must be 1 or 2, got {0}")]
    InvalidClipIndex(u8),
}

#[derive(Debug)]
struct SessionInner {
    status: SessionStatus,
    clips: [ClipEvent; 2],
    decision: Option<Decision>,
    field_index: usize,
    /// Bumped on every reset; a worker spawned under an older generation
    /// discards its result instead of publishing
    generation: u64,
}

/// One measurement session: clip events, decision, live trace, and the
/// background collection worker.
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
    live: Arc<Mutex<LiveTrace>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    make_source: Arc<SourceFactory>,
    config: CollectorConfig,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Session {
    /// Create a session that collects from the configured UDP port
    pub fn new(config: CollectorConfig) -> Self {
        let port = config.udp_port;
        Self::with_source_factory(
            config,
            Arc::new(move || {
                UdpFrameSource::bind(port).map(|s| Box::new(s) as Box<dyn FrameSource + Send>)
            }),
        )
    }

    /// Create a session with a custom frame-source factory (tests, replay)
    pub fn with_source_factory(config: CollectorConfig, make_source: Arc<SourceFactory>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                status: SessionStatus::Idle,
                clips: [ClipEvent::default(), ClipEvent::default()],
                decision: None,
                field_index: config.field_index,
                generation: 0,
            })),
            live: Arc::new(Mutex::new(LiveTrace::new())),
            worker: Mutex::new(None),
            make_source,
            config,
        }
    }

    /// Record a clip start reported by the playback side.
    ///
    /// The first report per clip index wins; repeats are ignored. Clip 1
    /// launches the collection worker unless one is already alive.
    pub fn report_clip_start(&self, clip: u8, duration_secs: f64) -> Result<(), SessionError> {
        if clip != 1 && clip != 2 {
            return Err(SessionError::InvalidClipIndex(clip));
        }

        let (generation, status) = {
            let mut inner = lock(&self.inner);
            let event = &mut inner.clips[clip as usize - 1];
            if event.started {
                tracing::debug!(clip, "Clip already reported, keeping first record");
            } else {
                *event = ClipEvent {
                    started: true,
                    start_time: Some(Utc::now()),
                    duration_secs: Some(duration_secs),
                };
                tracing::info!(clip, duration_secs, "Clip started");
            }
            (inner.generation, inner.status)
        };

        if clip == 1 && status == SessionStatus::Idle {
            self.spawn_worker_if_idle(generation);
        }
        Ok(())
    }

    /// Launch the collection worker unless a previous one is still running.
    ///
    /// Called only while the session is Idle; a finished or errored session
    /// must be reset before it can collect again.
    fn spawn_worker_if_idle(&self, generation: u64) {
        let mut worker = lock(&self.worker);
        let alive = worker.as_ref().map(|h| !h.is_finished()).unwrap_or(false);
        if alive {
            tracing::debug!("Collection worker already running, not relaunching");
            return;
        }

        let ctx = WorkerCtx {
            inner: Arc::clone(&self.inner),
            live: Arc::clone(&self.live),
            make_source: Arc::clone(&self.make_source),
            lead_time_secs: self.config.lead_time_secs,
            generation,
        };

        match std::thread::Builder::new()
            .name("eeg-collector".into())
            .spawn(move || run_collection(ctx))
        {
            Ok(handle) => {
                *worker = Some(handle);
                tracing::info!("Collection worker launched");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn collection worker");
                lock(&self.inner).status = SessionStatus::Error;
            }
        }
    }

    /// Clip event records for both indices
    pub fn clip_info(&self) -> [ClipEvent; 2] {
        lock(&self.inner).clips.clone()
    }

    /// Current coordinator status
    pub fn status(&self) -> SessionStatus {
        lock(&self.inner).status
    }

    /// Current decision, if one has been published
    pub fn decision(&self) -> Option<Decision> {
        lock(&self.inner).decision
    }

    /// Overwrite the decision (out-of-process collection path)
    pub fn submit_decision(&self, choice: Choice) {
        let mut inner = lock(&self.inner);
        inner.decision = Some(Decision {
            choice,
            decided_at: Utc::now(),
        });
        tracing::info!(%choice, "Decision received from external collector");
    }

    /// Change which payload field is averaged (band x channel selection)
    pub fn set_field_index(&self, index: usize) {
        lock(&self.inner).field_index = index;
    }

    /// Payload field index currently in effect
    pub fn field_index(&self) -> usize {
        lock(&self.inner).field_index
    }

    /// Collector configuration this session was created with
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Snapshot of the live trace plus the coordinator status
    pub fn live_snapshot(&self) -> LiveSnapshot {
        let status = self.status();
        let live = lock(&self.live);
        LiveSnapshot {
            value: live.latest(),
            history: live.history(),
            status,
        }
    }

    /// Return to Idle, clearing clip events, decision, and live trace.
    ///
    /// Safe to call while a window is collecting: the in-flight worker
    /// finishes its window naturally and discards the result.
    pub fn reset(&self) {
        {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            inner.status = SessionStatus::Idle;
            inner.clips = [ClipEvent::default(), ClipEvent::default()];
            inner.decision = None;
            inner.field_index = self.config.field_index;
        }
        lock(&self.live).clear();
        // The worker handle is kept: a draining pre-reset window holds the
        // UDP port until it closes, and the liveness check must keep seeing
        // it so a relaunch is deferred rather than failing to bind.
        tracing::info!("Session reset");
    }
}

struct WorkerCtx {
    inner: Arc<Mutex<SessionInner>>,
    live: Arc<Mutex<LiveTrace>>,
    make_source: Arc<SourceFactory>,
    lead_time_secs: f64,
    generation: u64,
}

impl WorkerCtx {
    /// Apply a status transition unless the session was reset.
    /// Returns false when the generation moved on and the worker must stop.
    fn advance(&self, status: SessionStatus) -> bool {
        let mut inner = lock(&self.inner);
        if inner.generation != self.generation {
            return false;
        }
        inner.status = status;
        true
    }

    fn clip(&self, index: usize) -> ClipEvent {
        lock(&self.inner).clips[index].clone()
    }

    fn field_index(&self) -> usize {
        lock(&self.inner).field_index
    }
}

/// Worker entry point: any collection failure marks the session errored
/// without touching the serving process.
fn run_collection(ctx: WorkerCtx) {
    match try_collect(&ctx) {
        Ok(()) => {}
        Err(e) => {
            tracing::error!(error = %e, "EEG collection failed");
            ctx.advance(SessionStatus::Error);
        }
    }
}

fn try_collect(ctx: &WorkerCtx) -> anyhow::Result<()> {
    let mut source = (ctx.make_source)()?;

    // Window 1: clip 1 has already been reported, that is what spawned us
    if !ctx.advance(SessionStatus::CollectingClip1) {
        return Ok(());
    }
    let clip1 = ctx.clip(0);
    let (Some(start), Some(duration)) = (clip1.start_time, clip1.duration_secs) else {
        anyhow::bail!("clip 1 event incomplete");
    };
    let budget = collection_budget(start, duration, Utc::now(), 0.0);
    tracing::info!(
        duration,
        budget_secs = budget.as_secs_f64(),
        "Collecting window 1"
    );
    let window1 = collect_window(
        source.as_mut(),
        ctx.field_index(),
        budget,
        "clip 1",
        Some(ctx.live.as_ref()),
    )?;
    if window1.count == 0 {
        tracing::warn!("No samples received for clip 1, is the headset sending?");
    }

    // Wait for the playback side to report clip 2
    if !ctx.advance(SessionStatus::AwaitingClip2) {
        return Ok(());
    }
    let clip2 = loop {
        std::thread::sleep(CLIP_POLL_INTERVAL);
        let inner = lock(&ctx.inner);
        if inner.generation != ctx.generation {
            tracing::info!("Session reset while awaiting clip 2, worker exiting");
            return Ok(());
        }
        if inner.clips[1].started {
            break inner.clips[1].clone();
        }
    };

    // Window 2: shortened by the lead time so the decision lands before
    // playback ends
    if !ctx.advance(SessionStatus::CollectingClip2) {
        return Ok(());
    }
    let (Some(start), Some(duration)) = (clip2.start_time, clip2.duration_secs) else {
        anyhow::bail!("clip 2 event incomplete");
    };
    let budget = collection_budget(start, duration, Utc::now(), ctx.lead_time_secs);
    tracing::info!(
        duration,
        budget_secs = budget.as_secs_f64(),
        "Collecting window 2"
    );
    let window2 = collect_window(
        source.as_mut(),
        ctx.field_index(),
        budget,
        "clip 2",
        Some(ctx.live.as_ref()),
    )?;
    if window2.count == 0 {
        tracing::warn!("No samples received for clip 2, is the headset sending?");
    }

    let mean_calm = window1.mean();
    let mean_excited = window2.mean();
    let choice = decide(mean_calm, mean_excited);

    let mut inner = lock(&ctx.inner);
    if inner.generation != ctx.generation {
        tracing::info!("Session reset during collection, result discarded");
        return Ok(());
    }
    inner.decision = Some(Decision {
        choice,
        decided_at: Utc::now(),
    });
    inner.status = SessionStatus::Done;
    tracing::info!(
        mean_calm,
        mean_excited,
        samples_1 = window1.count,
        samples_2 = window2.count,
        %choice,
        "Decision published"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new(CollectorConfig::default());
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.decision().is_none());
        assert!(!session.clip_info()[0].started);
    }

    #[test]
    fn test_rejects_bad_clip_index() {
        let session = Session::new(CollectorConfig::default());
        assert_eq!(
            session.report_clip_start(0, 10.0),
            Err(SessionError::InvalidClipIndex(0))
        );
        assert_eq!(
            session.report_clip_start(3, 10.0),
            Err(SessionError::InvalidClipIndex(3))
        );
    }

    #[test]
    fn test_submit_decision_overwrites() {
        let session = Session::new(CollectorConfig::default());
        session.submit_decision(Choice::Calm);
        assert_eq!(session.decision().unwrap().choice, Choice::Calm);
        session.submit_decision(Choice::Excited);
        assert_eq!(session.decision().unwrap().choice, Choice::Excited);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let session = Session::new(CollectorConfig::default());
        session.set_field_index(63);
        session.submit_decision(Choice::Excited);
        session.reset();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.decision().is_none());
        assert_eq!(session.field_index(), crate::DEFAULT_FIELD_INDEX);
    }

    #[test]
    fn test_first_clip_report_wins() {
        let session = Session::with_source_factory(
            CollectorConfig::default(),
            Arc::new(|| {
                let (_, rx) = crossbeam_channel::bounded(1);
                Ok(Box::new(crate::eeg::collector::ChannelFrameSource::new(rx))
                    as Box<dyn FrameSource + Send>)
            }),
        );
        session.report_clip_start(2, 10.0).unwrap();
        session.report_clip_start(2, 99.0).unwrap();
        assert_eq!(session.clip_info()[1].duration_secs, Some(10.0));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(SessionStatus::Idle.as_str(), "idle");
        assert_eq!(SessionStatus::CollectingClip1.as_str(), "collecting-clip1");
        assert_eq!(SessionStatus::Done.as_str(), "done");
        assert_eq!(
            serde_json::to_string(&SessionStatus::AwaitingClip2).unwrap(),
            "\"awaiting-clip2\""
        );
    }
}
