//! Perception adapter
//!
//! Turns face-mesh landmark frames produced by an external detector into the
//! per-frame `Signal`s the aggregator consumes. Landmark detection itself happens
//! outside this crate; only the heuristics over the landmarks live here.

mod extractor;
mod face_mesh;

pub use extractor::{DetectionThresholds, SignalExtractor};
pub use face_mesh::{landmark_index, FaceMeshFrame, Landmark};
