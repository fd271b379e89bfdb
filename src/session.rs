//! Session acquisition loop
//!
//! Drives one observation session on the calling thread: pull a frame, turn it into a
//! signal, fold it into the aggregator, report live status, then decide whether to
//! keep going. Stopping is cooperative: the per-frame callback can break out, and an
//! optional maximum duration is checked once per frame.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregator::ObservationAggregator;
use crate::classifier::LoopClassifier;
use crate::perception::{DetectionThresholds, SignalExtractor};
use crate::source::{FramePayload, FrameSource};
use crate::types::{ContextTag, LoopType, SessionSnapshot};

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Termination {
    /// The per-frame callback asked to stop
    StopRequested,
    /// The configured maximum duration was reached
    MaxDuration,
    /// The source ran out of frames
    EndOfStream,
    /// The source failed; the session was finalized with what it had
    DeviceFailure(String),
}

/// In-progress classification, reported after every frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStatus {
    pub frame_index: u64,
    pub elapsed_sec: f64,
    pub loop_type: LoopType,
    pub break_suggested: bool,
    pub context: ContextTag,
    pub blink_count: u32,
    pub blink_edge: bool,
}

/// Stop flag shared between the frame loop and whatever watches for a stop request,
/// such as a Ctrl-C handler on another thread.
///
/// The loop only sees the request on its next frame.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// `Break` once a stop was requested; meant as the tail of an `on_frame` callback
    pub fn poll(&self) -> ControlFlow<()> {
        if self.is_requested() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// A finished session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub snapshot: SessionSnapshot,
    pub termination: Termination,
}

/// Session runner settings
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Stop once a frame's elapsed time reaches this
    pub max_duration: Option<Duration>,
    /// Heuristic thresholds applied to face-mesh frames
    pub thresholds: DetectionThresholds,
}

/// Single-threaded frame loop over one `FrameSource`
pub struct SessionRunner {
    options: SessionOptions,
}

impl Default for SessionRunner {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl SessionRunner {
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }

    /// Run a session without live feedback
    pub fn run<S: FrameSource>(&self, source: S) -> SessionReport {
        self.run_with(source, |_| ControlFlow::Continue(()))
    }

    /// Run a session, calling `on_frame` after every frame.
    ///
    /// The source is consumed and dropped before this returns, whichever way the
    /// session ended.
    pub fn run_with<S, F>(&self, mut source: S, mut on_frame: F) -> SessionReport
    where
        S: FrameSource,
        F: FnMut(&LiveStatus) -> ControlFlow<()>,
    {
        let mut aggregator = ObservationAggregator::new();
        let mut extractor = SignalExtractor::new(self.options.thresholds);
        let mut elapsed = Duration::ZERO;

        debug!(max_duration = ?self.options.max_duration, "session started");

        let termination = loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break Termination::EndOfStream,
                Err(e) => {
                    warn!(error = %e, frames = aggregator.frame_count(), "frame source failed, finalizing session");
                    break Termination::DeviceFailure(e.to_string());
                }
            };

            // Sources may stamp out of order; the session never runs backwards
            elapsed = elapsed.max(frame.elapsed());

            let signal = match &frame.payload {
                FramePayload::Signal(signal) => signal.clone(),
                FramePayload::FaceMesh(mesh) => extractor.extract(mesh),
            };
            let blink_edge = aggregator.observe(&signal);

            let loop_type = LoopClassifier::classify_signals(&aggregator.signals(elapsed));
            let status = LiveStatus {
                frame_index: aggregator.frame_count(),
                elapsed_sec: elapsed.as_secs_f64(),
                loop_type,
                break_suggested: loop_type.suggests_break(),
                context: aggregator.context(),
                blink_count: aggregator.blink_count(),
                blink_edge,
            };

            if on_frame(&status).is_break() {
                break Termination::StopRequested;
            }

            if self
                .options
                .max_duration
                .is_some_and(|max| elapsed >= max)
            {
                break Termination::MaxDuration;
            }
        };

        drop(source);

        let snapshot = aggregator.finish(elapsed);
        debug!(
            frames = snapshot.frame_count,
            duration_sec = snapshot.duration_sec,
            ?termination,
            "session finished"
        );

        SessionReport {
            snapshot,
            termination,
        }
    }
}
