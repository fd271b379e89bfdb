//! Landmark heuristics
//!
//! A missing landmark never fails a frame: the sub-signal it feeds is reported as
//! absent and the rest of the frame is still used.

use serde::{Deserialize, Serialize};

use super::face_mesh::{landmark_index as idx, FaceMeshFrame, Landmark};
use crate::types::{GazePair, Signal};

/// Tunable thresholds for the landmark heuristics (normalized units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionThresholds {
    /// Lip gap above which the mouth counts as smiling
    pub smile_aperture: f64,
    /// Eyelid gap below which the eye counts as closed
    pub eye_closed_distance: f64,
    /// Hand movement between frames that counts toward a scroll
    pub scroll_displacement: f64,
    /// Qualifying hand movements needed to report a scroll
    pub scroll_repeats: u32,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            smile_aperture: 0.03,
            eye_closed_distance: 0.01,
            scroll_displacement: 0.05,
            scroll_repeats: 3,
        }
    }
}

/// Converts face-mesh frames into signals.
///
/// Stateful only for the scroll gesture, which needs the previous hand position and
/// a count of qualifying movements.
#[derive(Debug, Clone, Default)]
pub struct SignalExtractor {
    thresholds: DetectionThresholds,
    prev_hand_y: Option<f64>,
    scroll_counter: u32,
}

impl SignalExtractor {
    pub fn new(thresholds: DetectionThresholds) -> Self {
        Self {
            thresholds,
            prev_hand_y: None,
            scroll_counter: 0,
        }
    }

    pub fn thresholds(&self) -> &DetectionThresholds {
        &self.thresholds
    }

    /// Derive one frame's signal
    pub fn extract(&mut self, frame: &FaceMeshFrame) -> Signal {
        let scroll_detected = self.track_scroll(frame);

        let Some(face) = frame.primary_face() else {
            return Signal {
                scroll_detected,
                ..Signal::default()
            };
        };

        let gaze = match (face.get(idx::RIGHT_IRIS), face.get(idx::LEFT_IRIS)) {
            (Some(right), Some(left)) => Some(GazePair::new(
                right.to_pixel(frame.width, frame.height),
                left.to_pixel(frame.width, frame.height),
            )),
            _ => None,
        };

        let smile_detected = vertical_gap(face, idx::UPPER_LIP, idx::LOWER_LIP)
            .is_some_and(|gap| gap > self.thresholds.smile_aperture);

        let eye_closed = vertical_gap(face, idx::LEFT_EYE_UPPER_LID, idx::LEFT_EYE_LOWER_LID)
            .map(|gap| gap < self.thresholds.eye_closed_distance);

        Signal {
            face_detected: true,
            eyes_detected: gaze.is_some(),
            eye_closed,
            smile_detected,
            scroll_detected,
            gaze,
        }
    }

    fn track_scroll(&mut self, frame: &FaceMeshFrame) -> bool {
        let Some(hand_y) = frame.primary_hand_y() else {
            return false;
        };

        if let Some(prev) = self.prev_hand_y {
            if (hand_y - prev).abs() > self.thresholds.scroll_displacement {
                self.scroll_counter += 1;
            }
        }
        self.prev_hand_y = Some(hand_y);

        if self.scroll_counter >= self.thresholds.scroll_repeats {
            self.scroll_counter = 0;
            true
        } else {
            false
        }
    }
}

fn vertical_gap(face: &[Landmark], a: usize, b: usize) -> Option<f64> {
    Some((face.get(a)?.y - face.get(b)?.y).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;
    use pretty_assertions::assert_eq;

    /// Full refined mesh with open eyes, closed mouth and irises at known spots
    fn refined_face() -> Vec<Landmark> {
        let mut face = vec![Landmark::new(0.5, 0.5); 478];
        face[idx::UPPER_LIP] = Landmark::new(0.5, 0.70);
        face[idx::LOWER_LIP] = Landmark::new(0.5, 0.71);
        face[idx::LEFT_EYE_UPPER_LID] = Landmark::new(0.6, 0.40);
        face[idx::LEFT_EYE_LOWER_LID] = Landmark::new(0.6, 0.43);
        face[idx::RIGHT_IRIS] = Landmark::new(0.4, 0.415);
        face[idx::LEFT_IRIS] = Landmark::new(0.6, 0.415);
        face
    }

    fn frame_with(face: Option<Vec<Landmark>>, hand_y: Option<f64>) -> FaceMeshFrame {
        FaceMeshFrame {
            width: 640,
            height: 480,
            faces: face.into_iter().collect(),
            hands: hand_y
                .map(|y| vec![Landmark::new(0.5, y); 21])
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_no_face_signal() {
        let mut extractor = SignalExtractor::default();
        let signal = extractor.extract(&frame_with(None, None));
        assert_eq!(signal, Signal::default());
    }

    #[test]
    fn test_open_eyes_neutral_mouth() {
        let mut extractor = SignalExtractor::default();
        let signal = extractor.extract(&frame_with(Some(refined_face()), None));

        assert!(signal.face_detected);
        assert!(signal.eyes_detected);
        assert_eq!(signal.eye_closed, Some(false));
        assert!(!signal.smile_detected);
        assert_eq!(
            signal.gaze,
            Some(GazePair::new(Point::new(256.0, 199.0), Point::new(384.0, 199.0)))
        );
    }

    #[test]
    fn test_wide_mouth_and_closed_lids() {
        let mut face = refined_face();
        face[idx::LOWER_LIP] = Landmark::new(0.5, 0.75);
        face[idx::LEFT_EYE_LOWER_LID] = Landmark::new(0.6, 0.405);

        let mut extractor = SignalExtractor::default();
        let signal = extractor.extract(&frame_with(Some(face), None));

        assert!(signal.smile_detected);
        assert_eq!(signal.eye_closed, Some(true));
    }

    #[test]
    fn test_unrefined_mesh_has_no_irises() {
        let mut face = refined_face();
        face.truncate(468);

        let mut extractor = SignalExtractor::default();
        let signal = extractor.extract(&frame_with(Some(face), None));

        assert!(signal.face_detected);
        assert!(!signal.eyes_detected);
        assert!(signal.gaze.is_none());
        // Lids and lips are still inside the truncated mesh
        assert_eq!(signal.eye_closed, Some(false));
    }

    #[test]
    fn test_sparse_face_drops_sub_signals() {
        let mut extractor = SignalExtractor::default();
        let signal = extractor.extract(&frame_with(Some(vec![Landmark::default(); 10]), None));

        assert!(signal.face_detected);
        assert!(!signal.eyes_detected);
        assert!(!signal.smile_detected);
        assert_eq!(signal.eye_closed, None);
    }

    #[test]
    fn test_scroll_needs_repeated_hand_moves() {
        let mut extractor = SignalExtractor::default();
        let hand_positions = [0.2, 0.4, 0.2, 0.4, 0.2];

        let scrolls: Vec<bool> = hand_positions
            .iter()
            .map(|y| extractor.extract(&frame_with(None, Some(*y))).scroll_detected)
            .collect();

        // Third qualifying move fires, then the counter starts over
        assert_eq!(scrolls, vec![false, false, false, true, false]);
    }

    #[test]
    fn test_small_hand_moves_are_not_scroll() {
        let mut extractor = SignalExtractor::default();
        for i in 0..10 {
            let y = 0.5 + (i % 2) as f64 * 0.01;
            assert!(!extractor.extract(&frame_with(None, Some(y))).scroll_detected);
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let mut extractor = SignalExtractor::new(DetectionThresholds {
            smile_aperture: 0.005,
            ..DetectionThresholds::default()
        });
        let signal = extractor.extract(&frame_with(Some(refined_face()), None));
        assert!(signal.smile_detected);
    }
}
