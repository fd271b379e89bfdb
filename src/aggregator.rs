//! Observation aggregation
//!
//! Folds per-frame `Signal`s into the running state of one session and freezes that
//! state into a `SessionSnapshot` when the session ends.
//!
//! Face, eye, smile and scroll flags are last-frame-wins. Blinks are counted as
//! closed → open edges over the whole session, so the blink flag reflects the
//! session as a whole rather than the final frame.

use std::time::Duration;

use tracing::trace;

use crate::context::infer_context;
use crate::types::{
    ContextTag, GazePair, LoopSignals, SessionSnapshot, Signal, BLINK_DETECTED_MIN_COUNT,
};

/// Running state for a single observation session
#[derive(Debug, Clone)]
pub struct ObservationAggregator {
    gaze_trace: Vec<GazePair>,
    face_detected: bool,
    eyes_detected: bool,
    smile_detected: bool,
    scroll_detected: bool,
    blink_count: u32,
    prior_eye_open: bool,
    frame_count: u64,
}

impl Default for ObservationAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationAggregator {
    /// Create an aggregator ready for a fresh session
    pub fn new() -> Self {
        Self {
            gaze_trace: Vec::new(),
            face_detected: false,
            eyes_detected: false,
            smile_detected: false,
            scroll_detected: false,
            blink_count: 0,
            prior_eye_open: true,
            frame_count: 0,
        }
    }

    /// Reset all counters and the gaze trace for a new session
    pub fn start(&mut self) {
        *self = Self::new();
    }

    /// Fold one frame into the session.
    ///
    /// Returns `true` when this frame completed a blink (closed on the previous
    /// frame with eyelid data, open on this one).
    pub fn observe(&mut self, signal: &Signal) -> bool {
        self.frame_count += 1;

        if let Some(gaze) = signal.gaze {
            self.gaze_trace.push(gaze);
        }

        self.face_detected = signal.face_detected;
        self.eyes_detected = signal.eyes_detected;
        self.smile_detected = signal.smile_detected;
        self.scroll_detected = signal.scroll_detected;

        let Some(eye_closed) = signal.eye_closed else {
            return false;
        };

        let blink_edge = !eye_closed && !self.prior_eye_open;
        if blink_edge {
            self.blink_count += 1;
            trace!(
                blink_count = self.blink_count,
                frame = self.frame_count,
                "blink edge"
            );
        }
        self.prior_eye_open = !eye_closed;

        blink_edge
    }

    pub fn blink_count(&self) -> u32 {
        self.blink_count
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn gaze_trace(&self) -> &[GazePair] {
        &self.gaze_trace
    }

    fn blink_detected(&self) -> bool {
        self.blink_count > BLINK_DETECTED_MIN_COUNT
    }

    /// Classifier inputs for the session so far, without copying the trace
    pub fn signals(&self, elapsed: Duration) -> LoopSignals {
        LoopSignals {
            face_detected: self.face_detected,
            eyes_detected: self.eyes_detected,
            blink_detected: self.blink_detected(),
            smile_detected: self.smile_detected,
            scroll_detected: self.scroll_detected,
            duration_sec: elapsed.as_secs_f64(),
        }
    }

    /// Activity context for the session so far
    pub fn context(&self) -> ContextTag {
        infer_context(&self.gaze_trace, self.blink_count, self.face_detected)
    }

    /// Copy of the current state as a snapshot, leaving the session running
    pub fn snapshot(&self, elapsed: Duration) -> SessionSnapshot {
        self.clone().finish(elapsed)
    }

    /// End the session and freeze its state
    pub fn finish(self, elapsed: Duration) -> SessionSnapshot {
        let blink_detected = self.blink_detected();
        SessionSnapshot {
            gaze_trace: self.gaze_trace,
            face_detected: self.face_detected,
            eyes_detected: self.eyes_detected,
            blink_count: self.blink_count,
            blink_detected,
            smile_detected: self.smile_detected,
            scroll_detected: self.scroll_detected,
            duration_sec: elapsed.as_secs_f64(),
            frame_count: self.frame_count,
        }
    }
}
