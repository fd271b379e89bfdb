//! Frame sources
//!
//! A `FrameSource` stands in for the camera: it yields timestamped frames until the
//! stream ends or the device fails. The session runner owns its source for the
//! whole session and drops it on every exit path.

use std::collections::VecDeque;
use std::io::BufRead;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LoopError;
use crate::perception::FaceMeshFrame;
use crate::types::Signal;

/// What a frame carries: a ready-made signal, or raw landmarks to run heuristics on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FramePayload {
    Signal(Signal),
    FaceMesh(FaceMeshFrame),
}

/// One frame stamped with the time since session start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedFrame {
    /// Seconds since the session started
    pub elapsed_sec: f64,
    #[serde(flatten)]
    pub payload: FramePayload,
}

impl TimedFrame {
    pub fn signal(elapsed_sec: f64, signal: Signal) -> Self {
        Self {
            elapsed_sec,
            payload: FramePayload::Signal(signal),
        }
    }

    pub fn face_mesh(elapsed_sec: f64, frame: FaceMeshFrame) -> Self {
        Self {
            elapsed_sec,
            payload: FramePayload::FaceMesh(frame),
        }
    }

    /// Elapsed time, with negative or non-finite stamps clamped to zero
    pub fn elapsed(&self) -> Duration {
        Duration::try_from_secs_f64(self.elapsed_sec).unwrap_or(Duration::ZERO)
    }
}

/// Producer of frames for one session
pub trait FrameSource {
    /// Block until the next frame is available.
    ///
    /// `Ok(None)` signals a clean end of stream; `Err` a device failure.
    fn next_frame(&mut self) -> Result<Option<TimedFrame>, LoopError>;
}

/// In-memory frames, mostly for tests and host applications that buffer frames
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameSource {
    frames: VecDeque<TimedFrame>,
}

impl MemoryFrameSource {
    pub fn new(frames: impl IntoIterator<Item = TimedFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<TimedFrame>, LoopError> {
        Ok(self.frames.pop_front())
    }
}

/// Replays a recorded session: one JSON `TimedFrame` per line, blank lines skipped.
///
/// A read error or an unparsable line ends the session as a device failure.
pub struct NdjsonFrameSource<R: BufRead> {
    reader: R,
    line_num: usize,
    buffer: String,
}

impl<R: BufRead> NdjsonFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_num: 0,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead> FrameSource for NdjsonFrameSource<R> {
    fn next_frame(&mut self) -> Result<Option<TimedFrame>, LoopError> {
        loop {
            self.buffer.clear();
            let read = self
                .reader
                .read_line(&mut self.buffer)
                .map_err(|e| LoopError::Device(e.to_string()))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_num += 1;

            let trimmed = self.buffer.trim();
            if trimmed.is_empty() {
                continue;
            }

            return serde_json::from_str(trimmed).map(Some).map_err(|e| {
                LoopError::Parse(format!("Failed to parse frame on line {}: {}", self.line_num, e))
            });
        }
    }
}

impl<R: BufRead> Drop for NdjsonFrameSource<R> {
    fn drop(&mut self) {
        debug!(lines = self.line_num, "frame source released");
    }
}
