//! Face-mesh frame model
//!
//! Landmarks arrive normalized to `[0, 1]` in both axes, indexed the way the
//! 478-point refined face mesh numbers them.

use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Face-mesh landmark indices used by the signal heuristics
pub mod landmark_index {
    pub const UPPER_LIP: usize = 13;
    pub const LOWER_LIP: usize = 14;
    pub const LEFT_EYE_LOWER_LID: usize = 145;
    pub const LEFT_EYE_UPPER_LID: usize = 159;
    pub const RIGHT_IRIS: usize = 468;
    pub const LEFT_IRIS: usize = 473;
}

/// Normalized landmark position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Project onto the frame, truncating to whole pixels
    pub fn to_pixel(&self, width: u32, height: u32) -> Point {
        Point::new(
            (self.x * f64::from(width)).trunc(),
            (self.y * f64::from(height)).trunc(),
        )
    }
}

/// Detector output for one camera frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceMeshFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Landmark sets, one per detected face
    #[serde(default)]
    pub faces: Vec<Vec<Landmark>>,
    /// Landmark sets, one per detected hand
    #[serde(default)]
    pub hands: Vec<Vec<Landmark>>,
}

impl FaceMeshFrame {
    /// Landmarks of the primary face, if any face was detected
    pub fn primary_face(&self) -> Option<&[Landmark]> {
        self.faces.first().map(Vec::as_slice)
    }

    /// Mean vertical position of the primary hand
    pub fn primary_hand_y(&self) -> Option<f64> {
        let hand = self.hands.first().filter(|h| !h.is_empty())?;
        Some(hand.iter().map(|l| l.y).sum::<f64>() / hand.len() as f64)
    }
}
