//! Core data types
//!
//! Per-frame `Signal`s flow from the perception adapter into the aggregator, which
//! freezes them into a single `SessionSnapshot`. The snapshot is what the classifier,
//! the context heuristic and the loop log all read.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::infer_context;

/// A session counts as blinking heavily once more than this many blink edges were seen
pub const BLINK_DETECTED_MIN_COUNT: u32 = 3;

/// Pixel coordinate in the camera frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Right and left iris centers observed in the same frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazePair {
    pub right: Point,
    pub left: Point,
}

impl GazePair {
    pub fn new(right: Point, left: Point) -> Self {
        Self { right, left }
    }

    /// Combined movement of both irises relative to an earlier pair
    pub fn displacement_from(&self, previous: &GazePair) -> f64 {
        self.right.distance(&previous.right) + self.left.distance(&previous.left)
    }
}

/// One frame's worth of observations from the perception collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// A face was found in the frame
    #[serde(default)]
    pub face_detected: bool,
    /// Both iris landmarks were available
    #[serde(default)]
    pub eyes_detected: bool,
    /// Eyelid state this frame.
    ///
    /// `None` when the eyelid landmarks were unavailable; the aggregator then keeps
    /// its previous eye state and no blink edge can fire on this frame.
    #[serde(default)]
    pub eye_closed: Option<bool>,
    /// Mouth aperture heuristic fired
    #[serde(default)]
    pub smile_detected: bool,
    /// Repeated vertical hand displacement heuristic fired
    #[serde(default)]
    pub scroll_detected: bool,
    /// Iris pixel coordinates, present only when the irises were located
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gaze: Option<GazePair>,
}

/// The flags and duration the loop classifier decides on.
///
/// Split out of `SessionSnapshot` so in-progress sessions can be classified every
/// frame without copying the gaze trace.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoopSignals {
    pub face_detected: bool,
    pub eyes_detected: bool,
    pub blink_detected: bool,
    pub smile_detected: bool,
    pub scroll_detected: bool,
    pub duration_sec: f64,
}

/// Aggregated summary of a whole observation session
///
/// `blink_detected` is always recomputed from `blink_count` when parsing; a supplied
/// value is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotFields")]
pub struct SessionSnapshot {
    /// One entry per frame with both irises located, in temporal order
    pub gaze_trace: Vec<GazePair>,
    /// Face presence on the last processed frame
    pub face_detected: bool,
    /// Eye visibility on the last processed frame
    pub eyes_detected: bool,
    /// Closed-to-open transitions over the whole session
    pub blink_count: u32,
    /// `blink_count > BLINK_DETECTED_MIN_COUNT`
    pub blink_detected: bool,
    /// Smile heuristic on the last processed frame
    pub smile_detected: bool,
    /// Scroll heuristic on the last processed frame
    pub scroll_detected: bool,
    /// Seconds from session start to session end
    pub duration_sec: f64,
    /// Number of frames folded into this snapshot
    pub frame_count: u64,
}

/// Wire shape of a snapshot, without the derived blink flag
#[derive(Deserialize)]
struct SnapshotFields {
    #[serde(default)]
    gaze_trace: Vec<GazePair>,
    face_detected: bool,
    eyes_detected: bool,
    #[serde(default)]
    blink_count: u32,
    #[serde(default)]
    smile_detected: bool,
    #[serde(default)]
    scroll_detected: bool,
    #[serde(default)]
    duration_sec: f64,
    #[serde(default)]
    frame_count: u64,
}

impl From<SnapshotFields> for SessionSnapshot {
    fn from(fields: SnapshotFields) -> Self {
        Self {
            gaze_trace: fields.gaze_trace,
            face_detected: fields.face_detected,
            eyes_detected: fields.eyes_detected,
            blink_count: fields.blink_count,
            blink_detected: fields.blink_count > BLINK_DETECTED_MIN_COUNT,
            smile_detected: fields.smile_detected,
            scroll_detected: fields.scroll_detected,
            duration_sec: fields.duration_sec,
            frame_count: fields.frame_count,
        }
    }
}

impl SessionSnapshot {
    pub fn signals(&self) -> LoopSignals {
        LoopSignals {
            face_detected: self.face_detected,
            eyes_detected: self.eyes_detected,
            blink_detected: self.blink_count > BLINK_DETECTED_MIN_COUNT,
            smile_detected: self.smile_detected,
            scroll_detected: self.scroll_detected,
            duration_sec: self.duration_sec,
        }
    }

    /// Activity context guessed from the gaze trace
    pub fn context(&self) -> ContextTag {
        infer_context(&self.gaze_trace, self.blink_count, self.face_detected)
    }
}

/// Behavioral loop categories, in classifier output order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum LoopType {
    Normal,
    EscapeLoop,
    FreezeLoop,
    DoubtLoop,
    ComparisonLoop,
    ConsumptionLoop,
}

impl LoopType {
    pub const ALL: [LoopType; 6] = [
        LoopType::Normal,
        LoopType::EscapeLoop,
        LoopType::FreezeLoop,
        LoopType::DoubtLoop,
        LoopType::ComparisonLoop,
        LoopType::ConsumptionLoop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopType::Normal => "Normal",
            LoopType::EscapeLoop => "EscapeLoop",
            LoopType::FreezeLoop => "FreezeLoop",
            LoopType::DoubtLoop => "DoubtLoop",
            LoopType::ComparisonLoop => "ComparisonLoop",
            LoopType::ConsumptionLoop => "ConsumptionLoop",
        }
    }

    /// Whether this loop warrants suggesting a break
    pub fn suggests_break(&self) -> bool {
        matches!(self, LoopType::EscapeLoop | LoopType::FreezeLoop)
    }
}

impl fmt::Display for LoopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Coarse activity context inferred from gaze movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextTag {
    Reading,
    Writing,
    Browsing,
    #[serde(rename = "Writing/Thinking")]
    Thinking,
    #[serde(rename = "Escape/Idle")]
    EscapeIdle,
    Unknown,
}

impl ContextTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextTag::Reading => "Reading",
            ContextTag::Writing => "Writing",
            ContextTag::Browsing => "Browsing",
            ContextTag::Thinking => "Writing/Thinking",
            ContextTag::EscapeIdle => "Escape/Idle",
            ContextTag::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Result of classifying one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub loop_type: LoopType,
    pub break_suggested: bool,
    pub context: ContextTag,
}
