//! Activity context inference
//!
//! Guesses what the user was doing from how far their irises travelled between
//! frames. This is a heuristic consumed by the loop log, not by the classifier; the
//! only contract is that the same trace always yields the same tag.

use crate::types::{ContextTag, GazePair};

/// More blink edges than this in a session reads as thinking
const THINKING_MIN_BLINKS: u32 = 5;

/// Average per-frame iris movement (pixels) below which the user is reading
const READING_MAX_MOVEMENT_PX: f64 = 5.0;

/// Average per-frame iris movement (pixels) below which the user is writing
const WRITING_MAX_MOVEMENT_PX: f64 = 20.0;

/// Infer an activity context from a session's gaze trace.
///
/// Rules, first match wins:
/// 1. no face on the last frame → `EscapeIdle`
/// 2. more than 5 blinks → `Thinking`
/// 3. fewer than 2 gaze samples → `Unknown`
/// 4. mean movement `< 5` → `Reading`, `< 20` → `Writing`, otherwise `Browsing`
pub fn infer_context(gaze_trace: &[GazePair], blink_count: u32, face_detected: bool) -> ContextTag {
    if !face_detected {
        return ContextTag::EscapeIdle;
    }
    if blink_count > THINKING_MIN_BLINKS {
        return ContextTag::Thinking;
    }
    if gaze_trace.len() < 2 {
        return ContextTag::Unknown;
    }

    let movement = average_movement(gaze_trace);

    if movement < READING_MAX_MOVEMENT_PX {
        ContextTag::Reading
    } else if movement < WRITING_MAX_MOVEMENT_PX {
        ContextTag::Writing
    } else {
        ContextTag::Browsing
    }
}

/// Total step displacement divided by the number of samples (not the number of steps)
fn average_movement(gaze_trace: &[GazePair]) -> f64 {
    let total: f64 = gaze_trace
        .windows(2)
        .map(|pair| pair[1].displacement_from(&pair[0]))
        .sum();
    total / gaze_trace.len() as f64
}
