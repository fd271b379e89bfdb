//! Loop classification
//!
//! Maps a session's flags and duration onto a `LoopType` with a fixed priority chain.
//! The chain order is part of the behavior: smile and scroll are the most specific
//! signals and preempt the coarser face/eye states, and long sessions only fall back
//! to `ConsumptionLoop` when nothing else matched.

use crate::types::{Classification, LoopSignals, LoopType, SessionSnapshot};

/// Sessions longer than this (seconds) with no other finding are consumption loops
pub const CONSUMPTION_MIN_DURATION_SEC: f64 = 120.0;

/// Stateless loop classifier
pub struct LoopClassifier;

impl LoopClassifier {
    /// Classify a finished session
    pub fn classify(snapshot: &SessionSnapshot) -> LoopType {
        Self::classify_signals(&snapshot.signals())
    }

    /// Apply the priority chain, first match wins:
    ///
    /// 1. smile → `ComparisonLoop`
    /// 2. scroll → `ConsumptionLoop`
    /// 3. no face → `EscapeLoop`
    /// 4. face without eyes → `FreezeLoop`
    /// 5. heavy blinking → `DoubtLoop`
    /// 6. longer than 120s → `ConsumptionLoop`
    /// 7. otherwise `Normal`
    pub fn classify_signals(signals: &LoopSignals) -> LoopType {
        if signals.smile_detected {
            LoopType::ComparisonLoop
        } else if signals.scroll_detected {
            LoopType::ConsumptionLoop
        } else if !signals.face_detected {
            LoopType::EscapeLoop
        } else if !signals.eyes_detected {
            LoopType::FreezeLoop
        } else if signals.blink_detected {
            LoopType::DoubtLoop
        } else if signals.duration_sec > CONSUMPTION_MIN_DURATION_SEC {
            LoopType::ConsumptionLoop
        } else {
            LoopType::Normal
        }
    }

    /// Classify a snapshot together with its break suggestion and activity context
    pub fn evaluate(snapshot: &SessionSnapshot) -> Classification {
        let loop_type = Self::classify(snapshot);
        Classification {
            loop_type,
            break_suggested: loop_type.suggests_break(),
            context: snapshot.context(),
        }
    }
}
