//! MirrorMind - On-device behavioral loop detection from face and gaze signals
//!
//! MirrorMind turns a stream of per-frame face/gaze observations into a single
//! behavioral loop classification through a deterministic pipeline:
//! perception heuristics → session aggregation → loop classification → loop log.
//!
//! ## Modules
//!
//! - **Aggregation**: fold per-frame `Signal`s into one `SessionSnapshot`
//! - **Classification**: map a snapshot onto a `LoopType` plus a break suggestion
//! - **Sessions**: drive a `FrameSource` until it ends, fails, or is stopped
//! - **Log & dashboard**: persist outcomes as CSV rows and summarize them

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod logger;
pub mod perception;
pub mod pipeline;
pub mod session;
pub mod source;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::ObservationAggregator;
pub use classifier::LoopClassifier;
pub use config::MirrorConfig;
pub use dashboard::LogSummary;
pub use error::LoopError;
pub use logger::{LogRecord, PatternLog};
pub use pipeline::{frames_to_outcome, LogStatus, LoopProcessor, SessionOutcome};
pub use session::{
    LiveStatus, SessionOptions, SessionReport, SessionRunner, StopHandle, Termination,
};
pub use source::{FrameSource, MemoryFrameSource, NdjsonFrameSource, TimedFrame};
pub use types::{
    Classification, ContextTag, GazePair, LoopSignals, LoopType, Point, SessionSnapshot, Signal,
};

/// MirrorMind version
pub const MIRRORMIND_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "mirrormind";
